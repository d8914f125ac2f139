//! Standard operation library
//!
//! Built-in operation packages for common pipeline work: typed
//! constants, arithmetic and boolean logic, logging, string and list
//! manipulation, timing and HTTP. Each package exposes its signatures
//! (for the compiler) and registers its bodies (for the engine);
//! [`standard_registry`] and [`standard_library`] aggregate them all.

pub mod declare;
pub mod http;
pub mod list;
pub mod log;
pub mod logic;
pub mod string;
pub mod time;

use weftcore::SignatureRegistry;
use weftruntime::OperationLibrary;

pub fn standard_registry() -> SignatureRegistry {
    let mut registry = SignatureRegistry::new();
    for signature in declare::signatures()
        .into_iter()
        .chain(logic::signatures())
        .chain(log::signatures())
        .chain(string::signatures())
        .chain(list::signatures())
        .chain(time::signatures())
        .chain(http::signatures())
    {
        registry.register(signature);
    }
    registry
}

pub fn standard_library() -> OperationLibrary {
    let mut library = OperationLibrary::new();
    declare::register(&mut library);
    logic::register(&mut library);
    log::register(&mut library);
    string::register(&mut library);
    list::register(&mut library);
    time::register(&mut library);
    http::register(&mut library);
    library
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_signature_has_a_body() {
        let registry = standard_registry();
        let library = standard_library();
        for signature in registry.signatures() {
            assert!(
                library.get(signature.tag().as_str()).is_some(),
                "missing body for {}",
                signature.tag()
            );
        }
        assert_eq!(registry.signatures().len(), library.len());
    }
}
