pub use tone_protocol::{
    params, BlockInstance, CatalogEntry, Category, EntityKind, ParamSpec, ParamValue,
    RecognizedEntity, ResolutionSource, ToneSpec,
};
