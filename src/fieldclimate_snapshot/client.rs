// fieldclimate_snapshot - Weather snapshot generator for FieldClimate stations
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::error;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub enum ClientError {
    Internal(reqwest::Error),
    InvalidStation(String),
    InvalidUrl(String),
    MissingCredentials,
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidStation(s) => write!(f, "invalid station {}", s),
            Self::InvalidUrl(u) => write!(f, "invalid url {}", u),
            Self::MissingCredentials => write!(f, "public and private keys are required to sign requests"),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ClientError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Key pair used to sign requests to the FieldClimate API.
///
/// Either key may be absent: a client can be constructed without credentials but
/// every request it makes will fail with `ClientError::MissingCredentials`.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

impl Credentials {
    pub fn new(public_key: Option<String>, private_key: Option<String>) -> Self {
        Credentials {
            public_key: public_key.filter(|k| !k.is_empty()),
            private_key: private_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.keys().is_some()
    }

    fn keys(&self) -> Option<(&str, &str)> {
        match (&self.public_key, &self.private_key) {
            (Some(public), Some(private)) => Some((public.as_str(), private.as_str())),
            _ => None,
        }
    }
}

/// Format a time the way the `Request-Date` header expects it.
pub fn request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Hex encoded HMAC-SHA256 of `method + path + request_date + public_key`, keyed
/// with the private key.
pub fn sign(method: &str, path: &str, request_date: &str, public_key: &str, private_key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(private_key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(request_date.as_bytes());
    mac.update(public_key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[derive(Debug)]
pub struct FieldClimateClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl FieldClimateClient {
    const USER_AGENT: &'static str = concat!("fieldclimate_snapshot/", env!("CARGO_PKG_VERSION"));
    const JSON_RESPONSE: &'static str = "application/json";
    const REQUEST_DATE: &'static str = "Request-Date";

    pub fn new(client: Client, base_url: &str, credentials: Credentials) -> Result<Self, ClientError> {
        Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(FieldClimateClient {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    /// Fetch station metadata, including the rain totals maintained by the station.
    pub async fn station(&self, station: &str) -> Result<Station, ClientError> {
        let path = Self::station_path(station);
        tracing::debug!(message = "making station information request", path = %path);

        let res = self.make_request(station, &path).await?;
        res.json::<Station>().await.map_err(ClientError::Internal)
    }

    /// Fetch raw sensor samples for the trailing `hours` hours.
    pub async fn raw_data(&self, station: &str, hours: u32) -> Result<RawData, ClientError> {
        let path = Self::raw_data_path(station, hours);
        tracing::debug!(message = "making raw data request", path = %path);

        let res = self.make_request(station, &path).await?;
        res.json::<RawData>().await.map_err(ClientError::Internal)
    }

    async fn make_request(&self, station: &str, path: &str) -> Result<Response, ClientError> {
        let (public_key, private_key) = self.credentials.keys().ok_or(ClientError::MissingCredentials)?;
        let url = self.url(path)?;
        let date = request_date(Utc::now());
        let signature = sign("GET", path, &date, public_key, private_key);

        let res = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .header(AUTHORIZATION, format!("hmac {}:{}", public_key, signature))
            .header(Self::REQUEST_DATE, date)
            .send()
            .await
            .map_err(ClientError::Internal)?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res)
        } else if status == StatusCode::NOT_FOUND {
            Err(ClientError::InvalidStation(station.to_owned()))
        } else {
            Err(ClientError::Unexpected(status, url))
        }
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let full = format!("{}{}", self.base_url, path);
        Url::parse(&full).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", full, e)))
    }

    fn station_path(station: &str) -> String {
        format!("/station/{}", utf8_percent_encode(station, NON_ALPHANUMERIC))
    }

    fn raw_data_path(station: &str, hours: u32) -> String {
        format!(
            "/data/{}/raw/last/{}h",
            utf8_percent_encode(station, NON_ALPHANUMERIC),
            hours
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Station {
    #[serde(default)]
    pub name: StationName,
    #[serde(default)]
    pub meta: StationMeta,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct StationName {
    pub original: Option<String>,
    pub custom: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct StationMeta {
    #[serde(alias = "rainCurrentDay")]
    pub rain_current_day: Option<RainTotal>,
    #[serde(alias = "rain7d")]
    pub rain_7d: Option<RainSeries>,
    #[serde(alias = "airTemperatureDailyMinimum")]
    pub air_temperature_daily_minimum: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RainTotal {
    pub sum: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RainSeries {
    pub sum: Option<f64>,
    #[serde(default)]
    pub vals: Vec<Option<f64>>,
}

/// Samples for every sensor of a station, aligned to `dates`.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct RawData {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub data: Vec<SensorStream>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SensorStream {
    #[serde(default)]
    pub name_original: String,
    pub unit: Option<String>,
    #[serde(default)]
    pub values: HashMap<String, Vec<Option<f64>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const STATION_RESPONSE: &str = r#"{
        "name": { "original": "03114DE5", "custom": "כוכב השחר" },
        "position": { "altitude": 820 },
        "meta": {
            "time": 1769590800,
            "rainCurrentDay": { "vals": [0.2, 0.4], "sum": 1.2 },
            "rain7d": { "vals": [0, 3.1, 6, null, 0, 0, 1.2], "sum": 10.3 },
            "airTemperatureDailyMinimum": 8.1
        }
    }"#;

    const RAW_DATA_RESPONSE: &str = r#"{
        "dates": ["2026-01-28 10:00:00", "2026-01-28 10:15:00"],
        "data": [
            {
                "name_original": "HC Air temperature",
                "unit": "°C",
                "values": { "avg": [14.1, 14.3], "max": [14.4, 14.9], "min": [13.8, null] }
            },
            {
                "name_original": "Precipitation",
                "unit": "mm",
                "values": { "sum": [0.2, 0.0] }
            }
        ]
    }"#;

    #[test]
    fn test_request_date_format() {
        let now = Utc.with_ymd_and_hms(2026, 1, 28, 8, 5, 3).unwrap();
        assert_eq!("Wed, 28 Jan 2026 08:05:03 GMT", request_date(now));
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2, split across the signed components
        let signature = sign("what", " do ya want", " for nothing?", "", "Jefe");
        assert_eq!(
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
            signature
        );
    }

    #[test]
    fn test_sign_depends_on_request_date() {
        let first = sign("GET", "/station/03114DE5", "Wed, 28 Jan 2026 08:05:03 GMT", "pub", "secret");
        let second = sign("GET", "/station/03114DE5", "Wed, 28 Jan 2026 08:05:04 GMT", "pub", "secret");
        let again = sign("GET", "/station/03114DE5", "Wed, 28 Jan 2026 08:05:03 GMT", "pub", "secret");

        assert_eq!(64, first.len());
        assert_eq!(first, again);
        assert_ne!(first, second);
    }

    #[test]
    fn test_credentials_empty_keys_are_missing() {
        let creds = Credentials::new(Some("pub".to_owned()), Some(String::new()));
        assert!(!creds.is_complete());
        assert!(creds.private_key.is_none());

        let creds = Credentials::new(Some("pub".to_owned()), Some("secret".to_owned()));
        assert!(creds.is_complete());
    }

    #[test]
    fn test_paths_encode_station() {
        assert_eq!("/station/03114DE5", FieldClimateClient::station_path("03114DE5"));
        assert_eq!("/station/a%2Fb", FieldClimateClient::station_path("a/b"));
        assert_eq!(
            "/data/03114DE5/raw/last/24h",
            FieldClimateClient::raw_data_path("03114DE5", 24)
        );
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let res = FieldClimateClient::new(Client::new(), "not a url", Credentials::default());
        assert!(matches!(res, Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client =
            FieldClimateClient::new(Client::new(), "https://api.fieldclimate.com/v2/", Credentials::default()).unwrap();
        let url = client.url("/station/03114DE5").unwrap();
        assert_eq!("https://api.fieldclimate.com/v2/station/03114DE5", url.as_str());
    }

    fn credentials() -> Credentials {
        Credentials::new(Some("pub".to_owned()), Some("secret".to_owned()))
    }

    fn local_client(base_url: &str) -> FieldClimateClient {
        let http = Client::builder().no_proxy().build().unwrap();
        FieldClimateClient::new(http, base_url, credentials()).unwrap()
    }

    /// Accept a single connection, answer it with `status` and an empty body, and
    /// return the request head that was received.
    async fn respond_once(status: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_lowercase()
        });

        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_request_connection_refused_is_internal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(&format!("http://{}", addr));
        let res = client.station("03114DE5").await;
        assert!(matches!(res, Err(ClientError::Internal(_))));
    }

    #[tokio::test]
    async fn test_request_server_error_is_unexpected() {
        let (base_url, handle) = respond_once("500 Internal Server Error").await;
        let client = local_client(&base_url);

        match client.raw_data("03114DE5", 24).await {
            Err(ClientError::Unexpected(status, url)) => {
                assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
                assert_eq!("/data/03114DE5/raw/last/24h", url.path());
            }
            other => panic!("expected unexpected status error, got {:?}", other),
        }

        let request = handle.await.unwrap();
        assert!(request.starts_with("get /data/03114de5/raw/last/24h "));
        assert!(request.contains("authorization: hmac pub:"));
        assert!(request.contains("request-date: "));
        assert!(request.contains("accept: application/json"));
        assert!(!request.contains("secret"));
    }

    #[tokio::test]
    async fn test_request_not_found_is_invalid_station() {
        let (base_url, handle) = respond_once("404 Not Found").await;
        let client = local_client(&base_url);

        let res = client.station("03114DE5").await;
        assert!(matches!(res, Err(ClientError::InvalidStation(ref s)) if s == "03114DE5"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_without_credentials_fails() {
        let client = FieldClimateClient::new(Client::new(), "http://127.0.0.1:9", Credentials::default()).unwrap();
        let res = client.station("03114DE5").await;
        assert!(matches!(res, Err(ClientError::MissingCredentials)));
    }

    #[test]
    fn test_station_response() {
        let station: Station = serde_json::from_str(STATION_RESPONSE).unwrap();
        assert_eq!(Some("כוכב השחר"), station.name.custom.as_deref());
        assert_eq!(Some(1.2), station.meta.rain_current_day.and_then(|r| r.sum));
        assert_eq!(Some(8.1), station.meta.air_temperature_daily_minimum);

        let rain_7d = station.meta.rain_7d.unwrap();
        assert_eq!(Some(10.3), rain_7d.sum);
        assert_eq!(7, rain_7d.vals.len());
        assert_eq!(None, rain_7d.vals[3]);
    }

    #[test]
    fn test_station_response_without_meta() {
        let station: Station = serde_json::from_str(r#"{"name": {"original": "03114DE5"}}"#).unwrap();
        assert!(station.name.custom.is_none());
        assert!(station.meta.rain_current_day.is_none());
        assert!(station.meta.rain_7d.is_none());
    }

    #[test]
    fn test_raw_data_response() {
        let raw: RawData = serde_json::from_str(RAW_DATA_RESPONSE).unwrap();
        assert_eq!(2, raw.dates.len());
        assert_eq!(2, raw.data.len());
        assert_eq!("HC Air temperature", raw.data[0].name_original);
        assert_eq!(Some("mm"), raw.data[1].unit.as_deref());
        assert_eq!(&vec![Some(13.8), None], raw.data[0].values.get("min").unwrap());
    }
}
