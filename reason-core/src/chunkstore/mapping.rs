//! Chunk<->symbol mapping rules and overlay/base drift detection.

use super::types::{Chunk, ChunkKind, DriftReport, DriftType, SymbolVisibility};

/// Leaf function chunk <-> symbol is always 1:1; this just asserts the shape
/// callers can rely on (a function chunk always carries exactly one
/// `symbol_id`, never a list).
pub fn function_symbol(chunk: &Chunk) -> Option<&str> {
    if chunk.kind == ChunkKind::Function {
        chunk.symbol_id.as_deref()
    } else {
        None
    }
}

/// Class chunk <-> class symbol + its public methods. Visibility-filters
/// `methods` (children already resolved to `Chunk`s) down to the ones that
/// belong in the class's symbol surface.
pub fn class_public_methods<'a>(methods: &'a [Chunk]) -> Vec<&'a Chunk> {
    methods
        .iter()
        .filter(|m| m.kind == ChunkKind::Function)
        .filter(|m| matches!(m.symbol_visibility, Some(SymbolVisibility::Public) | None))
        .collect()
}

/// Aggregation summary for file/module/project chunks: the defined symbols
/// (children whose fqn is rooted here) vs merely referenced ones (mentioned
/// via CALLS/IMPORTS edges the dependency graph already carries — that
/// distinction lives in the graph, not the chunk tree, so this only counts
/// what the chunk hierarchy itself defines).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSymbols {
    pub defined_functions: usize,
    pub defined_classes: usize,
}

pub fn aggregate_defined_symbols(children: &[Chunk]) -> AggregateSymbols {
    let mut agg = AggregateSymbols::default();
    for child in children {
        match child.kind {
            ChunkKind::Function => agg.defined_functions += 1,
            ChunkKind::Class => agg.defined_classes += 1,
            _ => {}
        }
    }
    agg
}

/// Compare an overlay chunk against the base chunk it shadows and report how
/// (if at all) it has drifted.
pub fn detect_drift(overlay: &Chunk, base: Option<&Chunk>) -> DriftReport {
    let overlay_chunk_id = overlay.chunk_id.clone();
    let base_chunk_id = overlay.base_chunk_id.clone().unwrap_or_default();

    let Some(base) = base else {
        return DriftReport {
            overlay_chunk_id,
            base_chunk_id,
            drift_type: DriftType::BaseMissing,
            detail: "base chunk no longer exists".to_string(),
        };
    };

    if overlay.span() != base.span() {
        return DriftReport {
            overlay_chunk_id,
            base_chunk_id,
            drift_type: DriftType::LineShift,
            detail: format!("overlay span {:?} vs base span {:?}", overlay.span(), base.span()),
        };
    }

    if overlay.content_hash != base.content_hash {
        return DriftReport {
            overlay_chunk_id,
            base_chunk_id,
            drift_type: DriftType::ContentDivergence,
            detail: "content hash differs from base".to_string(),
        };
    }

    DriftReport {
        overlay_chunk_id,
        base_chunk_id,
        drift_type: DriftType::None,
        detail: "overlay matches base".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(fqn: &str, start: u32, end: u32, visibility: Option<SymbolVisibility>) -> Chunk {
        let mut c = Chunk::new("r", "s", ChunkKind::Function, fqn).with_span(start, end);
        c.symbol_visibility = visibility;
        c
    }

    #[test]
    fn class_methods_filter_private() {
        let methods = vec![
            function("C.pub_method", 1, 5, Some(SymbolVisibility::Public)),
            function("C._priv_method", 6, 10, Some(SymbolVisibility::Private)),
        ];
        let public = class_public_methods(&methods);
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].fqn, "C.pub_method");
    }

    #[test]
    fn drift_detects_missing_base() {
        let mut overlay = function("f.foo", 1, 5, None);
        overlay.is_overlay = true;
        overlay.base_chunk_id = Some("chunk:r:function:f.foo".to_string());
        let report = detect_drift(&overlay, None);
        assert_eq!(report.drift_type, DriftType::BaseMissing);
    }

    #[test]
    fn drift_detects_content_divergence() {
        let mut overlay = function("f.foo", 1, 5, None);
        overlay.content_hash = "abc".into();
        let mut base = function("f.foo", 1, 5, None);
        base.content_hash = "def".into();
        let report = detect_drift(&overlay, Some(&base));
        assert_eq!(report.drift_type, DriftType::ContentDivergence);
    }

    #[test]
    fn drift_reports_none_for_identical_overlay() {
        let mut overlay = function("f.foo", 1, 5, None);
        overlay.content_hash = "abc".into();
        let mut base = function("f.foo", 1, 5, None);
        base.content_hash = "abc".into();
        let report = detect_drift(&overlay, Some(&base));
        assert_eq!(report.drift_type, DriftType::None);
    }
}
