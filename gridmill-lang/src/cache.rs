use crate::error::LangError;
use crate::eval::Program;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// MD5 digest of callable source text, the content part of a cache key.
pub fn source_digest(source: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(source.as_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    class: String,
    attr: String,
    digest: [u8; 16],
}

/// Cache of materialized callables.
///
/// Keyed by `(class, attribute, md5(source))` so that identical source
/// arriving in many envelopes is compiled at most once per role.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<CacheKey, Arc<Program>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &mut self,
        class: &str,
        attr: &str,
        source: &str,
    ) -> Result<Arc<Program>, LangError> {
        let key = CacheKey {
            class: class.to_string(),
            attr: attr.to_string(),
            digest: source_digest(source),
        };
        if let Some(program) = self.programs.get(&key) {
            trace!("compile cache hit for {}::{}", class, attr);
            return Ok(program.clone());
        }
        let program = Arc::new(Program::compile(source)?);
        self.programs.insert(key, program.clone());
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
