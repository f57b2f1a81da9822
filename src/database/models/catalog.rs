use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Read-only reference row consumed by forms
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CatalogoItem {
    pub id: i32,
    pub nombre: String,
}

/// Catalog tables exposed through the API. Requested names are matched
/// against this list before touching SQL; anything else is a 404, never an
/// identifier interpolation.
pub const CATALOGOS: &[&str] = &[
    "roles",
    "areas",
    "tipos_violencia",
    "municipios",
    "medios_agresion",
    "situaciones_riesgo",
    "derivaciones",
];

pub fn is_valid_catalogo(name: &str) -> bool {
    CATALOGOS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_catalog_names() {
        assert!(is_valid_catalogo("areas"));
        assert!(is_valid_catalogo("tipos_violencia"));
        assert!(!is_valid_catalogo("usuarios"));
        assert!(!is_valid_catalogo("areas; DROP TABLE areas"));
    }
}
