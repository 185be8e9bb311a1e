use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub seed_drivers: bool,
    pub dispatch: DispatchSettings,
    pub pricing: PricingSettings,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub radius_meters: f64,
    /// Empty means the straight-line oracle is used instead of HTTP routing.
    pub routing_base_url: String,
    pub routing_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            radius_meters: 10_000.0,
            routing_base_url: "https://router.project-osrm.org/route/v1/driving".to_string(),
            routing_timeout: Duration::from_millis(3_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PricingSettings {
    pub minimum_fare: f64,
    pub per_km_rate: f64,
    pub fallback_fare: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            minimum_fare: 5.0,
            per_km_rate: 1.5,
            fallback_fare: 8.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub tick: Duration,
    pub pickup_steps: u32,
    pub dropoff_steps: u32,
    pub eta_seconds_per_step: u64,
}

impl SimulationSettings {
    pub fn total_steps(&self) -> u32 {
        self.pickup_steps + self.dropoff_steps
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1_200),
            pickup_steps: 15,
            dropoff_steps: 25,
            eta_seconds_per_step: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let dispatch_defaults = DispatchSettings::default();
        let pricing_defaults = PricingSettings::default();
        let simulation_defaults = SimulationSettings::default();

        let pickup_steps: u32 = parse_or_default("SIM_PICKUP_STEPS", simulation_defaults.pickup_steps)?;
        let dropoff_steps: u32 =
            parse_or_default("SIM_DROPOFF_STEPS", simulation_defaults.dropoff_steps)?;
        if pickup_steps == 0 || dropoff_steps == 0 {
            return Err(AppError::Internal(
                "SIM_PICKUP_STEPS and SIM_DROPOFF_STEPS must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 4000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 256)?,
            seed_drivers: parse_or_default("SEED_DRIVERS", false)?,
            dispatch: DispatchSettings {
                radius_meters: parse_or_default(
                    "DISPATCH_RADIUS_METERS",
                    dispatch_defaults.radius_meters,
                )?,
                routing_base_url: env::var("ROUTING_BASE_URL")
                    .unwrap_or(dispatch_defaults.routing_base_url),
                routing_timeout: Duration::from_millis(parse_or_default(
                    "ROUTING_TIMEOUT_MS",
                    dispatch_defaults.routing_timeout.as_millis() as u64,
                )?),
            },
            pricing: PricingSettings {
                minimum_fare: parse_or_default("MIN_FARE", pricing_defaults.minimum_fare)?,
                per_km_rate: parse_or_default("PER_KM_RATE", pricing_defaults.per_km_rate)?,
                fallback_fare: parse_or_default("FALLBACK_FARE", pricing_defaults.fallback_fare)?,
            },
            simulation: SimulationSettings {
                tick: Duration::from_millis(parse_or_default(
                    "SIM_TICK_MS",
                    simulation_defaults.tick.as_millis() as u64,
                )?),
                pickup_steps,
                dropoff_steps,
                eta_seconds_per_step: parse_or_default(
                    "ETA_SECONDS_PER_STEP",
                    simulation_defaults.eta_seconds_per_step,
                )?,
            },
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
