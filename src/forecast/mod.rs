pub mod engine;
pub mod enrichment;
pub mod features;
pub mod map;
pub mod peaks;
pub mod weather;

pub use engine::*;
pub use enrichment::{enrich_registry, PvgisClient, RadiationSource};
pub use map::{daily_map_frames, render_map_gif, MapFrame, MapPoint};
pub use peaks::peak_hours;
pub use weather::{OpenMeteoClient, RegionWeather, WeatherSource, WeatherTable};
