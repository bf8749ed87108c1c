use crate::extractor::axum::imports;
use crate::extractor::{
    build_routes, rust_extractor_io, Extractor, Framework, Handler, HandlerIo, ParameterConvention, Route,
    RouteExtractor, SchemaGenerator,
};
use crate::model::SourceUnit;
use crate::parser::Language;

use log::debug;

/// Actix-Web route extractor
pub struct ActixExtractor;

impl RouteExtractor for ActixExtractor {
    fn framework(&self) -> Framework {
        Framework::ActixWeb
    }

    fn extract_routes(&self, units: &[SourceUnit]) -> Vec<Route> {
        let routes = build_routes(
            units,
            |unit| unit.language == Language::Rust && imports(unit, "actix_web"),
            &ActixConvention,
        );
        debug!("Found {} Actix-Web routes", routes.len());
        routes
    }
}

struct ActixConvention;

impl ParameterConvention for ActixConvention {
    fn handler_io(&self, handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> HandlerIo {
        rust_extractor_io(handler, schemas, |wrapper| match wrapper {
            "Json" | "Form" => Some(Extractor::Body),
            "Path" => Some(Extractor::Path),
            "Query" => Some(Extractor::Query),
            "Header" => Some(Extractor::Header),
            // web::Data, ReqData and friends
            _ => None,
        })
    }
}
