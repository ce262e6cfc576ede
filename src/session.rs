//! Session – the upload → design → preview → download flow as an explicit
//! state machine. Each step owns exactly the data it needs; transitions that
//! do not apply to the current step fail with [`Error::InvalidTransition`]
//! and leave the session untouched.

use crate::editor::TemplateEditor;
use crate::error::Error;
use crate::pipeline::{BatchObserver, BatchOutcome, BatchRenderer};
use crate::render::RenderedDocument;
use crate::source::TabularData;
use crate::template::Template;

#[derive(Debug, Clone, Default)]
pub enum Session {
    /// Waiting for a data file.
    #[default]
    Upload,
    /// Data loaded; the layout is being edited.
    Design {
        data: TabularData,
        editor: TemplateEditor,
    },
    /// Layout saved; ready to generate.
    Preview {
        data: TabularData,
        template: Template,
    },
    /// Documents generated.
    Download { outcome: BatchOutcome },
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the current step, for messages.
    pub fn step_name(&self) -> &'static str {
        match self {
            Session::Upload => "upload",
            Session::Design { .. } => "design",
            Session::Preview { .. } => "preview",
            Session::Download { .. } => "download",
        }
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            action,
            state: self.step_name(),
        }
    }

    /// Upload → Design with already parsed data.
    pub fn upload(&mut self, data: TabularData) -> Result<(), Error> {
        if !matches!(self, Session::Upload) {
            return Err(self.invalid("upload data"));
        }
        log::info!(
            "Loaded {} row(s) with columns {:?}",
            data.rows.len(),
            data.headers
        );
        *self = Session::Design {
            data,
            editor: TemplateEditor::new(),
        };
        Ok(())
    }

    /// Parse `bytes` and upload them. A parse failure keeps the session in
    /// the upload step.
    pub fn upload_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if !matches!(self, Session::Upload) {
            return Err(self.invalid("upload data"));
        }
        let data = TabularData::from_bytes(bytes)?;
        self.upload(data)
    }

    /// Column names of the uploaded data, while they are still held.
    pub fn headers(&self) -> Option<&[String]> {
        match self {
            Session::Design { data, .. } | Session::Preview { data, .. } => Some(&data.headers),
            _ => None,
        }
    }

    pub fn editor(&self) -> Option<&TemplateEditor> {
        match self {
            Session::Design { editor, .. } => Some(editor),
            _ => None,
        }
    }

    pub fn editor_mut(&mut self) -> Option<&mut TemplateEditor> {
        match self {
            Session::Design { editor, .. } => Some(editor),
            _ => None,
        }
    }

    pub fn template(&self) -> Option<&Template> {
        match self {
            Session::Preview { template, .. } => Some(template),
            _ => None,
        }
    }

    /// Design → Preview. Field columns missing from the data are logged;
    /// they render blank.
    pub fn complete_template(&mut self) -> Result<(), Error> {
        let Session::Design { editor, data } = self else {
            return Err(self.invalid("save the template"));
        };
        let template = editor.complete();
        template.validate()?;
        for column in template.missing_columns(&data.headers) {
            log::warn!("Template field {column:?} is not a column of the data");
        }
        let data = std::mem::take(data);
        *self = Session::Preview { data, template };
        Ok(())
    }

    /// Preview → Design, keeping the saved layout.
    pub fn back_to_design(&mut self) -> Result<(), Error> {
        let Session::Preview { data, template } = self else {
            return Err(self.invalid("return to the designer"));
        };
        let editor = TemplateEditor::from_template(std::mem::take(template));
        let data = std::mem::take(data);
        *self = Session::Design { data, editor };
        Ok(())
    }

    /// Preview → Download. A failed batch keeps the session in Preview so
    /// generation can be retried.
    pub fn generate(
        &mut self,
        renderer: &BatchRenderer,
        observer: &mut dyn BatchObserver,
    ) -> Result<(), Error> {
        let Session::Preview { data, template } = self else {
            return Err(self.invalid("generate documents"));
        };
        let outcome = renderer.run(template, &data.rows, observer)?;
        *self = Session::Download { outcome };
        Ok(())
    }

    pub fn outcome(&self) -> Option<&BatchOutcome> {
        match self {
            Session::Download { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Generated documents, in row order.
    pub fn documents(&self) -> Option<&[RenderedDocument]> {
        match self {
            Session::Download { outcome } => Some(&outcome.documents),
            _ => None,
        }
    }

    /// Back to the upload step from anywhere.
    pub fn reset(&mut self) {
        *self = Session::Upload;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{FailurePolicy, RenderConfig};
    use crate::render::UnmappablePolicy;

    const CSV: &[u8] = b"Name,Amount\nAlice,10\nBob,\n";

    fn designed() -> Session {
        let mut s = Session::new();
        s.upload_bytes(CSV).unwrap();
        s.editor_mut().unwrap().add_field("Amount");
        s
    }

    #[test]
    fn happy_path() {
        let mut s = designed();
        assert_eq!(s.step_name(), "design");
        assert_eq!(s.headers().unwrap(), ["Name", "Amount"]);

        s.complete_template().unwrap();
        assert_eq!(s.step_name(), "preview");
        assert_eq!(s.template().unwrap().elements.len(), 1);

        s.generate(&BatchRenderer::default(), &mut ()).unwrap();
        assert!(s.outcome().unwrap().is_complete());
        assert_eq!(s.documents().unwrap().len(), 2);
        assert_eq!(s.headers(), None);
    }

    #[test]
    fn parse_failure_stays_in_upload() {
        let mut s = Session::new();
        assert!(matches!(
            s.upload_bytes(b"Name\n"),
            Err(Error::Parse(crate::error::ParseError::NoRows))
        ));
        assert_eq!(s.step_name(), "upload");
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut s = Session::new();
        assert!(matches!(
            s.complete_template(),
            Err(Error::InvalidTransition { state: "upload", .. })
        ));
        assert!(s.generate(&BatchRenderer::default(), &mut ()).is_err());

        let mut s = designed();
        assert!(s.upload(TabularData::default()).is_err());
        assert!(s.back_to_design().is_err());
        assert_eq!(s.step_name(), "design");
    }

    #[test]
    fn failed_generation_stays_in_preview() {
        let mut s = Session::new();
        s.upload_bytes("Name\nΩmega\n".as_bytes()).unwrap();
        s.editor_mut().unwrap().add_field("Name");
        s.complete_template().unwrap();

        let renderer = BatchRenderer::new(RenderConfig {
            unmappable: UnmappablePolicy::Error,
            failure_policy: FailurePolicy::AbortBatch,
            ..RenderConfig::default()
        });
        assert!(matches!(
            s.generate(&renderer, &mut ()),
            Err(Error::Render { row: 0, .. })
        ));
        assert_eq!(s.step_name(), "preview");

        // Retrying with the lenient default succeeds.
        s.generate(&BatchRenderer::default(), &mut ()).unwrap();
        assert_eq!(s.step_name(), "download");
    }

    #[test]
    fn back_to_design_keeps_layout() {
        let mut s = designed();
        s.complete_template().unwrap();
        s.back_to_design().unwrap();
        let editor = s.editor().unwrap();
        assert_eq!(editor.elements().len(), 1);
        assert_eq!(editor.selected_id(), None);
    }

    #[test]
    fn reset_from_anywhere() {
        let mut s = designed();
        s.reset();
        assert!(matches!(s, Session::Upload));
    }
}
