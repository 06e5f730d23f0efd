//! Effects, pools and their lookups.
//!
//! An [`Effect`] is a cheap, clonable handle: cloning adds a reference and
//! dropping the last one releases every device object the effect created. A
//! child effect keeps a handle to its pool, so the pool outlives its children.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;

use crate::device::{Device, OwnedObjects};
use crate::error::EffectError;
use crate::graph::{EffectGraph, EffectState};
use crate::parse::parse_effect;
use crate::shader::{DxbcReflector, ShaderReflector};
use crate::technique::Technique;
use crate::variable::{ConstantBufferVariable, EffectVariable, Owner, VarLoc, VariableId, VariableInterface};

bitflags! {
    /// `D3D10_EFFECT_*` creation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EffectFlags: u32 {
        /// The effect shares symbols with a pool.
        const CHILD_EFFECT = 0x1;
        /// Accepted for compatibility.
        const ALLOW_SLOW_OPS = 0x2;
        /// Accepted for compatibility; access must be serialized either way.
        const SINGLE_THREADED = 0x8;
    }
}

/// `D3D10_EFFECT_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectDesc {
    /// `true` when the effect was created against a pool.
    pub is_child_effect: bool,
    /// Buffers declared by this effect.
    pub constant_buffers: u32,
    /// Buffers visible through the pool.
    pub shared_constant_buffers: u32,
    /// Buffer members and object variables declared by this effect.
    pub global_variables: u32,
    /// Variables visible through the pool.
    pub shared_global_variables: u32,
    /// Techniques.
    pub techniques: u32,
}

pub(crate) struct EffectInner {
    pub(crate) pool: Option<Effect>,
    pub(crate) flags: EffectFlags,
    pub(crate) is_pool: bool,
    pub(crate) optimized: bool,
    pub(crate) graph: EffectGraph,
    state: Mutex<EffectState>,
    objects: OwnedObjects,
}

impl EffectInner {
    pub(crate) fn device(&self) -> &Arc<dyn Device> {
        self.objects.device()
    }

    /// Locks the mutable state. A panic while the lock was held leaves plain
    /// data behind, so poisoning is ignored.
    pub(crate) fn state(&self) -> MutexGuard<'_, EffectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn owner(&self, owner: Owner) -> Option<&EffectInner> {
        match owner {
            Owner::Local => Some(self),
            Owner::Pool => self.pool.as_ref().map(|p| p.inner.as_ref()),
        }
    }

    /// Resolves a reference stored in this effect's graph.
    pub(crate) fn resolve(&self, loc: VarLoc) -> Option<(&EffectInner, VariableId)> {
        let owner = self.owner(loc.owner)?;
        ((loc.id.0 as usize) < owner.graph.variables.len()).then_some((owner, loc.id))
    }
}

/// A parsed effect.
#[derive(Clone)]
pub struct Effect {
    pub(crate) inner: Arc<EffectInner>,
}

impl core::fmt::Debug for Effect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Effect")
            .field("is_pool", &self.inner.is_pool)
            .field("is_child", &self.inner.pool.is_some())
            .field("optimized", &self.inner.optimized)
            .field("buffers", &self.inner.graph.buffers.len())
            .field("techniques", &self.inner.graph.techniques.len())
            .field("device_objects", &self.inner.objects.len())
            .finish()
    }
}

impl Effect {
    /// Parses an effect from a compiled `fx_4_0`/`fx_4_1` blob, reflecting
    /// shaders through their own `RDEF`/`ISGN`/`OSGN` chunks.
    pub fn from_memory(
        data: &[u8],
        flags: EffectFlags,
        device: Arc<dyn Device>,
        pool: Option<&EffectPool>,
    ) -> Result<Self, EffectError> {
        Self::from_memory_with_reflector(data, flags, device, pool, &DxbcReflector)
    }

    /// Like [`Effect::from_memory`], with a custom reflection service.
    pub fn from_memory_with_reflector(
        data: &[u8],
        mut flags: EffectFlags,
        device: Arc<dyn Device>,
        pool: Option<&EffectPool>,
        reflector: &dyn ShaderReflector,
    ) -> Result<Self, EffectError> {
        match pool {
            Some(_) => flags |= EffectFlags::CHILD_EFFECT,
            None if flags.contains(EffectFlags::CHILD_EFFECT) => {
                return Err(EffectError::InvalidUsage("child effect created without a pool"));
            }
            None => {}
        }
        let pool = pool.map(|p| p.effect.clone());
        Self::create(data, flags, device, pool, false, reflector)
    }

    fn create(
        data: &[u8],
        flags: EffectFlags,
        device: Arc<dyn Device>,
        pool: Option<Effect>,
        is_pool: bool,
        reflector: &dyn ShaderReflector,
    ) -> Result<Self, EffectError> {
        let parsed = parse_effect(
            data,
            device,
            pool.as_ref().map(|p| p.inner.as_ref()),
            is_pool,
            reflector,
        )?;
        tracing::debug!(
            buffers = parsed.graph.buffers.len(),
            variables = parsed.graph.variables.len(),
            techniques = parsed.graph.techniques.len(),
            device_objects = parsed.objects.len(),
            is_pool,
            child = pool.is_some(),
            "created effect"
        );
        Ok(Self {
            inner: Arc::new(EffectInner {
                pool,
                flags,
                is_pool,
                optimized: false,
                graph: parsed.graph,
                state: Mutex::new(parsed.state),
                objects: parsed.objects,
            }),
        })
    }

    /// Counts of buffers, globals and techniques, including the pool's shared ones.
    pub fn desc(&self) -> EffectDesc {
        let graph = &self.inner.graph;
        let pool = self.inner.pool.as_ref().map(|p| &p.inner.graph);
        EffectDesc {
            is_child_effect: self.inner.flags.contains(EffectFlags::CHILD_EFFECT),
            constant_buffers: graph.buffers.len() as u32,
            shared_constant_buffers: pool.map_or(0, |p| p.buffers.len() as u32),
            global_variables: graph.global_count() as u32,
            shared_global_variables: pool.map_or(0, |p| p.global_count() as u32),
            techniques: graph.techniques.len() as u32,
        }
    }

    /// The device the effect's objects were created on.
    pub fn device(&self) -> &Arc<dyn Device> {
        self.inner.device()
    }

    /// `true` for the effect behind an [`EffectPool`].
    pub fn is_pool(&self) -> bool {
        self.inner.is_pool
    }

    /// `true` once [`Effect::optimize`] has run.
    pub fn is_optimized(&self) -> bool {
        self.inner.optimized
    }

    /// The pool this effect shares symbols with.
    pub fn pool(&self) -> Option<&Effect> {
        self.inner.pool.as_ref()
    }

    /// Number of live handles to this effect, children included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Local buffers first, then the pool's.
    pub fn constant_buffer_by_index(&self, index: u32) -> ConstantBufferVariable<'_> {
        let local = &self.inner.graph.buffers;
        let variable = match local.get(index as usize) {
            Some(buffer) => EffectVariable::new(&self.inner, buffer.variable),
            None => match &self.inner.pool {
                Some(pool) => pool
                    .inner
                    .graph
                    .buffers
                    .get(index as usize - local.len())
                    .map_or_else(EffectVariable::invalid, |b| EffectVariable::new(&pool.inner, b.variable)),
                None => EffectVariable::invalid(),
            },
        };
        variable.as_constant_buffer()
    }

    /// Searches local buffers first, then the pool's.
    pub fn constant_buffer_by_name(&self, name: &str) -> ConstantBufferVariable<'_> {
        self.search(|inner| {
            inner
                .graph
                .find_buffer(name)
                .map(|b| inner.graph.buffers[b].variable)
        })
        .as_constant_buffer()
    }

    /// Local globals (buffer members, then objects) first, then the pool's.
    pub fn variable_by_index(&self, index: u32) -> EffectVariable<'_> {
        let local = self.inner.graph.global_count();
        let index = index as usize;
        if index < local {
            return self
                .inner
                .graph
                .globals()
                .nth(index)
                .map_or_else(EffectVariable::invalid, |id| EffectVariable::new(&self.inner, id));
        }
        match &self.inner.pool {
            Some(pool) => pool
                .inner
                .graph
                .globals()
                .nth(index - local)
                .map_or_else(EffectVariable::invalid, |id| EffectVariable::new(&pool.inner, id)),
            None => EffectVariable::invalid(),
        }
    }

    /// The effect's own variables shadow the pool's.
    pub fn variable_by_name(&self, name: &str) -> EffectVariable<'_> {
        self.search(|inner| inner.graph.find_variable(name))
    }

    /// Case-insensitive.
    pub fn variable_by_semantic(&self, semantic: &str) -> EffectVariable<'_> {
        self.search(|inner| inner.graph.find_variable_by_semantic(semantic))
    }

    fn search(&self, find: impl Fn(&EffectInner) -> Option<VariableId>) -> EffectVariable<'_> {
        if let Some(id) = find(self.inner.as_ref()) {
            return EffectVariable::new(&self.inner, id);
        }
        self.inner
            .pool
            .as_ref()
            .and_then(|pool| find(pool.inner.as_ref()).map(|id| EffectVariable::new(&pool.inner, id)))
            .unwrap_or_else(EffectVariable::invalid)
    }

    /// Invalid when `index` is out of range.
    pub fn technique_by_index(&self, index: u32) -> Technique<'_> {
        Technique::new(&self.inner, index as usize)
    }

    /// Always invalid after [`Effect::optimize`].
    pub fn technique_by_name(&self, name: &str) -> Technique<'_> {
        self.inner
            .graph
            .techniques
            .iter()
            .position(|t| t.name.as_deref() == Some(name))
            .map_or_else(Technique::invalid, |index| Technique::new(&self.inner, index))
    }

    /// Drops shader bytecode and reflection and every technique and pass name.
    ///
    /// Irreversible; a second call does nothing.
    ///
    /// Requires `self` to be the only handle: fails with
    /// [`EffectError::InvalidUsage`] while any clone of this effect, or any
    /// child effect created against it as a pool, is still alive.
    pub fn optimize(&mut self) -> Result<(), EffectError> {
        if self.inner.optimized {
            return Ok(());
        }
        let inner = Arc::get_mut(&mut self.inner)
            .ok_or(EffectError::InvalidUsage("optimize requires the only handle to the effect"))?;

        let mut released = 0usize;
        for shader in &mut inner.graph.shaders {
            if let Some(bytecode) = shader.bytecode.take() {
                released += bytecode.len();
            }
            shader.reflection = None;
        }
        for technique in &mut inner.graph.techniques {
            technique.name = None;
            for pass in &mut technique.passes {
                pass.name = None;
            }
        }
        inner.optimized = true;
        tracing::debug!(released_bytes = released, "optimized effect");
        Ok(())
    }
}

/// An effect that only provides shared symbols to child effects.
#[derive(Debug, Clone)]
pub struct EffectPool {
    effect: Effect,
}

impl EffectPool {
    /// Creates a pool from a compiled effect, reflecting shaders with [`DxbcReflector`].
    pub fn from_memory(data: &[u8], flags: EffectFlags, device: Arc<dyn Device>) -> Result<Self, EffectError> {
        Self::from_memory_with_reflector(data, flags, device, &DxbcReflector)
    }

    /// Creates a pool with a caller-supplied shader reflector.
    pub fn from_memory_with_reflector(
        data: &[u8],
        flags: EffectFlags,
        device: Arc<dyn Device>,
        reflector: &dyn ShaderReflector,
    ) -> Result<Self, EffectError> {
        if flags.contains(EffectFlags::CHILD_EFFECT) {
            return Err(EffectError::InvalidUsage("a pool cannot be a child effect"));
        }
        Ok(Self {
            effect: Effect::create(data, flags, device, None, true, reflector)?,
        })
    }

    /// The pool's own effect interface.
    pub fn as_effect(&self) -> &Effect {
        &self.effect
    }

    /// See [`Effect::optimize`]; fails while child effects are alive.
    pub fn optimize(&mut self) -> Result<(), EffectError> {
        self.effect.optimize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn handles_are_thread_safe() {
        assert_send_sync::<Effect>();
        assert_send_sync::<EffectPool>();
    }

    #[test]
    fn child_flag_without_pool_is_rejected() {
        let device: Arc<dyn Device> = Arc::new(crate::device::NullDevice::new());
        let err = Effect::from_memory(&[], EffectFlags::CHILD_EFFECT, device, None).unwrap_err();
        assert!(matches!(err, EffectError::InvalidUsage(_)));
    }
}
