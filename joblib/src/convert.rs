use crate::errors::ConversionError;
use crate::types::Markup;

/// Output of a document conversion: the rendered markup plus any advisory messages
/// the converter produced along the way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Conversion {
    pub markup: Markup,
    pub messages: Vec<String>,
}

impl Conversion {
    pub fn new(markup: impl Into<Markup>) -> Self {
        Self {
            markup: markup.into(),
            messages: Vec::new(),
        }
    }
}

/// Converts an uploaded document into structured markup.
///
/// Conversion runs on the blocking pool, so implementations are free to do CPU-bound work.
pub trait Converter: Send + Sync + 'static {
    fn convert(&self, document: &[u8]) -> Result<Conversion, ConversionError>;
}

impl<F> Converter for F
where
    F: Fn(&[u8]) -> Result<Conversion, ConversionError> + Send + Sync + 'static,
{
    fn convert(&self, document: &[u8]) -> Result<Conversion, ConversionError> {
        self(document)
    }
}
