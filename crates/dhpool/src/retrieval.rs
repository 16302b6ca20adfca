use crate::{Error, PoolStore, Result, SizeClass};
use std::path::PathBuf;
use std::sync::Arc;

/// Available count for one size class.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClassStatus {
    pub class: SizeClass,
    pub available: usize,
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStatus {
    /// Target count per class the replenisher works toward.
    pub minimum: usize,
    pub classes: Vec<ClassStatus>,
}

/// Read-only access to the pool for consumers.
///
/// Nothing here mutates the pool or touches the filesystem: [`Self::pick`]
/// resolves a request to a path and the transport streams it. Requests for
/// an empty class fail immediately and are never queued.
#[derive(Debug, Clone)]
pub struct Retrieval {
    store: Arc<PoolStore>,
    dir: PathBuf,
    minimum: usize,
}

impl Retrieval {
    pub fn new(store: Arc<PoolStore>, dir: impl Into<PathBuf>, minimum: usize) -> Self {
        Self {
            store,
            dir: dir.into(),
            minimum,
        }
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            minimum: self.minimum,
            classes: self
                .store
                .classes()
                .map(|class| ClassStatus {
                    class,
                    available: self.store.count(class),
                })
                .collect(),
        }
    }

    /// Resolves a size class, as given by a consumer, to the path of a
    /// randomly chosen admitted artifact.
    ///
    /// # Errors
    ///
    /// - [`Error::UnrecognizedClass`] if `class` does not parse or is not
    ///   served.
    /// - [`Error::PoolEmpty`] if nothing is admitted for it right now.
    pub fn pick(&self, class: &str) -> Result<PathBuf> {
        let parsed: SizeClass = class.parse()?;
        if !self.store.recognizes(parsed) {
            return Err(Error::UnrecognizedClass {
                class: class.to_string(),
            });
        }
        let id = self.store.sample_random(parsed)?;
        Ok(self.dir.join(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArtifactId;
    use std::path::Path;

    const C2048: SizeClass = SizeClass::new(2048);
    const C4096: SizeClass = SizeClass::new(4096);

    fn retrieval() -> Retrieval {
        let store = Arc::new(PoolStore::new([C2048, C4096]));
        Retrieval::new(store, "/srv/dhparams", 10)
    }

    #[test]
    fn status_lists_every_class() {
        let retrieval = retrieval();
        retrieval
            .store
            .admit(ArtifactId::new("4096_aaaaaaaa.key"), C4096);

        assert_eq!(
            retrieval.status(),
            PoolStatus {
                minimum: 10,
                classes: vec![
                    ClassStatus {
                        class: C2048,
                        available: 0
                    },
                    ClassStatus {
                        class: C4096,
                        available: 1
                    },
                ],
            }
        );
    }

    #[test]
    fn pick_rejects_unknown_classes() {
        let retrieval = retrieval();
        for class in ["1337", "abc", "", "-2048", "2048.0", "02048"] {
            match retrieval.pick(class) {
                Err(Error::UnrecognizedClass { class: got }) => assert_eq!(got, class),
                other => panic!("{class}: expected UnrecognizedClass, got {other:?}"),
            }
        }
    }

    #[test]
    fn pick_empty_class_is_retryable() {
        let err = retrieval().pick("2048").unwrap_err();
        assert!(matches!(err, Error::PoolEmpty { class } if class == C2048));
        assert!(err.is_retryable());
    }

    #[test]
    fn pick_resolves_into_storage_dir() {
        let retrieval = retrieval();
        retrieval
            .store
            .admit(ArtifactId::new("2048_aaaaaaaa.key"), C2048);

        assert_eq!(
            retrieval.pick("2048").unwrap(),
            Path::new("/srv/dhparams/2048_aaaaaaaa.key")
        );
        assert_eq!(retrieval.status().classes[0].available, 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn status_serializes() {
        let json = serde_json::to_value(retrieval().status()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "minimum": 10,
                "classes": [
                    { "class": 2048, "available": 0 },
                    { "class": 4096, "available": 0 },
                ],
            })
        );
    }
}
