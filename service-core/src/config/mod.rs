use crate::error::AppError;
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;

/// Load `T` from an optional `configuration` file overlaid with `APP__*`
/// environment variables (`APP__REDIS__URL` maps to `redis.url`).
///
/// Env values stay strings; `config` converts them when `T` asks for a
/// number or bool, so `APP__RELAY__HISTORY_KEY=007` is kept as `"007"`.
/// `T` must not use `#[serde(flatten)]`, which bypasses that conversion.
///
/// A `.env` file in the working directory is read first if present.
pub fn load_layered<T: DeserializeOwned>() -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Config::builder()
        .add_source(File::with_name("configuration").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
