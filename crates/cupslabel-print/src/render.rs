// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label rendering seam.
//
// The host owns templates and turns them into PDF bytes; the driver only
// needs something that does that on request. Embedders without a template
// engine use `NoRenderer` and send pre-rendered documents.

use tracing::debug;

use cupslabel_core::error::{CupsLabelError, Result};
use cupslabel_core::types::{LabelItem, LabelSource};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Turns a template and an item into printable PDF bytes.
pub trait LabelRenderer: Send + Sync {
    fn render(&self, template: &str, item: &LabelItem) -> Result<Vec<u8>>;
}

impl<F> LabelRenderer for F
where
    F: Fn(&str, &LabelItem) -> Result<Vec<u8>> + Send + Sync,
{
    fn render(&self, template: &str, item: &LabelItem) -> Result<Vec<u8>> {
        self(template, item)
    }
}

/// Renderer for relays that only accept pre-rendered PDFs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl LabelRenderer for NoRenderer {
    fn render(&self, template: &str, _item: &LabelItem) -> Result<Vec<u8>> {
        Err(CupsLabelError::Render(format!(
            "no label renderer configured for template '{template}'"
        )))
    }
}

/// Produce the document bytes for `source`.
pub fn materialise(renderer: &dyn LabelRenderer, source: LabelSource) -> Result<Vec<u8>> {
    let document = match source {
        LabelSource::Rendered(bytes) => bytes,
        LabelSource::Template { template, item } => {
            debug!(template = %template, reference = %item.reference, "rendering label");
            renderer.render(&template, &item)?
        }
    };

    if document.is_empty() {
        return Err(CupsLabelError::Render("label document is empty".into()));
    }
    if !document.starts_with(PDF_MAGIC) {
        // CUPS filters may still cope; the job is sent as application/pdf regardless.
        debug!("label document does not start with a PDF header");
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> LabelItem {
        LabelItem {
            reference: "stock-17".into(),
            fields: Default::default(),
        }
    }

    #[test]
    fn rendered_bytes_pass_through() {
        let bytes = materialise(&NoRenderer, LabelSource::Rendered(b"%PDF-1.7".to_vec())).unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
    }

    #[test]
    fn closure_renders_template() {
        let renderer = |template: &str, item: &LabelItem| -> Result<Vec<u8>> {
            Ok(format!("%PDF {template} {}", item.reference).into_bytes())
        };
        let bytes = materialise(
            &renderer,
            LabelSource::Template {
                template: "small".into(),
                item: item(),
            },
        )
        .unwrap();
        assert_eq!(bytes, b"%PDF small stock-17");
    }

    #[test]
    fn no_renderer_refuses_templates() {
        let err = materialise(
            &NoRenderer,
            LabelSource::Template {
                template: "small".into(),
                item: item(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, CupsLabelError::Render(_)));
    }

    #[test]
    fn empty_document_rejected() {
        let err = materialise(&NoRenderer, LabelSource::Rendered(Vec::new())).unwrap_err();
        assert!(matches!(err, CupsLabelError::Render(_)));
    }
}
