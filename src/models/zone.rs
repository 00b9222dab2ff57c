use serde::{Deserialize, Serialize};

/// Static reference data: a delivery region covering one or more cities.
/// Immutable during orchestration; only loaded through the operator surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryZone {
    pub id: String,
    pub name: String,
    pub cities: Vec<String>,
    pub base_fee: f64,
    pub transit_days: u8,
}

impl DeliveryZone {
    pub fn covers_city(&self, city: &str) -> bool {
        self.cities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(city.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::DeliveryZone;

    fn zone() -> DeliveryZone {
        DeliveryZone {
            id: "z1".to_string(),
            name: "North".to_string(),
            cities: vec!["Hamburg".to_string(), "Kiel".to_string()],
            base_fee: 4.5,
            transit_days: 1,
        }
    }

    #[test]
    fn covers_city_is_case_insensitive() {
        assert!(zone().covers_city("hamburg"));
        assert!(zone().covers_city(" KIEL "));
    }

    #[test]
    fn does_not_cover_unlisted_city() {
        assert!(!zone().covers_city("Munich"));
    }
}
