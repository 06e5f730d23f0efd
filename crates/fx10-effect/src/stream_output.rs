//! Stream-output declarations attached to geometry shaders.
//!
//! A declaration is a `;`-separated list of entries of the form
//! `[slot:]SEMANTIC[index][.mask]`. `$SKIP` (any case) declares a gap. The mask
//! is a contiguous run of `xyzw` or `rgba` and selects the written components.

use crate::error::EffectError;

/// Number of stream-output buffer slots.
pub const STREAM_OUTPUT_SLOTS: u8 = 4;

/// `D3D10_SO_DECLARATION_ENTRY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutputEntry {
    /// Output semantic; `None` for a `$SKIP` gap.
    pub semantic_name: Option<String>,
    /// Semantic index taken from trailing digits.
    pub semantic_index: u32,
    /// First written component.
    pub start_component: u8,
    /// Number of written components.
    pub component_count: u8,
    /// Output buffer slot.
    pub output_slot: u8,
}

/// A parsed declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamOutputDeclaration {
    /// Entries in declaration order.
    pub entries: Vec<StreamOutputEntry>,
    /// Bytes written per vertex to slot 0.
    pub stride: u32,
}

/// Parses a stream-output declaration. Any malformed entry fails the whole declaration.
pub fn parse_stream_output_declaration(decl: &str) -> Result<StreamOutputDeclaration, EffectError> {
    let mut out = StreamOutputDeclaration::default();
    for raw in decl.split(';') {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        let parsed = parse_entry(entry).ok_or_else(|| {
            EffectError::malformed(format!("invalid stream output entry {entry:?} in {decl:?}"))
        })?;
        if parsed.output_slot == 0 {
            out.stride += u32::from(parsed.component_count) * 4;
        }
        out.entries.push(parsed);
    }
    tracing::debug!(entries = out.entries.len(), stride = out.stride, "parsed stream output declaration");
    Ok(out)
}

fn parse_entry(entry: &str) -> Option<StreamOutputEntry> {
    let (output_slot, rest) = match entry.split_once(':') {
        Some((slot, rest)) => {
            let slot = slot.trim();
            if slot.is_empty() || !slot.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let slot: u8 = slot.parse().ok()?;
            if slot >= STREAM_OUTPUT_SLOTS {
                return None;
            }
            (slot, rest.trim())
        }
        None => (0, entry),
    };

    let (semantic, start_component, component_count) = match rest.split_once('.') {
        Some((semantic, mask)) => {
            let start = "xyzw".find(mask).or_else(|| "rgba".find(mask))?;
            (semantic, start as u8, mask.len() as u8)
        }
        None => (rest, 0, 4),
    };

    if semantic.eq_ignore_ascii_case("$SKIP") {
        return Some(StreamOutputEntry {
            semantic_name: None,
            semantic_index: 0,
            start_component,
            component_count,
            output_slot,
        });
    }

    let name_len = semantic.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if name_len == 0 {
        return None;
    }
    let (name, index) = semantic.split_at(name_len);
    let semantic_index = if index.is_empty() { 0 } else { index.parse().ok()? };

    Some(StreamOutputEntry {
        semantic_name: Some(name.to_owned()),
        semantic_index,
        start_component,
        component_count,
        output_slot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_slot_zero_counts_toward_the_stride() {
        let decl = parse_stream_output_declaration("0:SV_POSITION.xyzw;1:COLOR0.xyz").unwrap();
        assert_eq!(
            decl.entries,
            vec![
                StreamOutputEntry {
                    semantic_name: Some("SV_POSITION".into()),
                    semantic_index: 0,
                    start_component: 0,
                    component_count: 4,
                    output_slot: 0,
                },
                StreamOutputEntry {
                    semantic_name: Some("COLOR".into()),
                    semantic_index: 0,
                    start_component: 0,
                    component_count: 3,
                    output_slot: 1,
                },
            ]
        );
        assert_eq!(decl.stride, 16);
    }

    #[test]
    fn skip_declares_a_gap() {
        let decl = parse_stream_output_declaration("$SKIP.xy").unwrap();
        assert_eq!(decl.entries.len(), 1);
        assert_eq!(decl.entries[0].semantic_name, None);
        assert_eq!(decl.entries[0].component_count, 2);
        assert_eq!(decl.stride, 8);

        let decl = parse_stream_output_declaration("$skip").unwrap();
        assert_eq!(decl.entries[0].semantic_name, None);
        assert_eq!(decl.stride, 16);
    }

    #[test]
    fn masks_pick_start_and_count() {
        let decl = parse_stream_output_declaration("TEXCOORD3.yz; COLOR.gba").unwrap();
        let e = &decl.entries;
        assert_eq!(e[0].semantic_name.as_deref(), Some("TEXCOORD"));
        assert_eq!(e[0].semantic_index, 3);
        assert_eq!((e[0].start_component, e[0].component_count), (1, 2));
        assert_eq!((e[1].start_component, e[1].component_count), (1, 3));
        assert_eq!(decl.stride, 20);
    }

    #[test]
    fn no_mask_writes_all_four_components() {
        let decl = parse_stream_output_declaration("POSITION;").unwrap();
        assert_eq!(decl.entries.len(), 1);
        assert_eq!(decl.entries[0].component_count, 4);
    }

    #[test]
    fn malformed_entries_fail_the_declaration() {
        for bad in ["a:POSITION", "0x:POSITION", "POSITION.xz", "POSITION.q", "9:POSITION", "1.xy"] {
            let err = parse_stream_output_declaration(bad).unwrap_err();
            assert!(err.is_malformed_input(), "{bad}");
        }
    }
}
