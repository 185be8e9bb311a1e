use crate::config::PricingSettings;
use crate::models::trip::Route;

pub fn quote(route: Option<&Route>, settings: &PricingSettings) -> f64 {
    let fare = match route {
        Some(route) => {
            let distance_km = route.distance_meters.max(0.0) / 1_000.0;
            settings.minimum_fare.max(distance_km * settings.per_km_rate)
        }
        None => settings.fallback_fare,
    };

    round_cents(fare)
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::quote;
    use crate::config::PricingSettings;
    use crate::models::trip::Route;

    fn route(distance_meters: f64) -> Route {
        Route {
            distance_meters,
            duration_seconds: 600.0,
            geometry: None,
        }
    }

    #[test]
    fn short_trip_pays_minimum_fare() {
        let price = quote(Some(&route(3_000.0)), &PricingSettings::default());
        assert_eq!(price, 5.00);
    }

    #[test]
    fn long_trip_is_distance_based_and_rounded() {
        let settings = PricingSettings::default();
        assert_eq!(quote(Some(&route(10_000.0)), &settings), 15.00);
        // 8.123 km * 1.5 = 12.1845
        assert_eq!(quote(Some(&route(8_123.0)), &settings), 12.18);
    }

    #[test]
    fn missing_route_uses_fallback_fare() {
        assert_eq!(quote(None, &PricingSettings::default()), 8.00);
    }
}
