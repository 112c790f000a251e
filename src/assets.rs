pub(crate) mod decode;
pub(crate) mod originals;
pub(crate) mod sample;
