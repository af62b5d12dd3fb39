use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use http_body_util::Full;
use hyper::{
    body::Incoming,
    header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE},
    service::Service,
    Method, Request, Response, StatusCode,
};
use regex::Regex;
use serde::Serialize;
use url_escape::decode;

use std::{
    collections::HashMap, future::Future, pin::Pin, str::FromStr, sync::Arc, time::Duration,
};

use crate::{
    config::Config,
    dataset::{centre::Centre, Dataset},
    export::ics::{closure_events, closures_calendar, EXPORT_FILE_NAME},
    proximity::{distance::Coordinate, ranker::nearby_open},
    session::favourites::SessionStore,
    timing::sg_date_now::sg_date_now,
};

use super::responses::{FavouritesResponse, MapMarker, NearbyResponse, StatusResponse};

type HttpResult = Result<Response<Full<Bytes>>, hyper::Error>;

/// The Server
///
/// Handles every API endpoint on top of a shared, read-only `Dataset`. The
/// only mutable state is the per-session favourites held in `SessionStore`.
///
/// Implements hyper's `Service`, and is cloned for each connection.
#[derive(Clone)]
pub struct Server {
    dataset: Arc<Dataset>,
    sessions: Arc<SessionStore>,
    radius_km: f64,
    session_sanitizer: Regex,
}

impl Server {
    pub fn setup(dataset: Arc<Dataset>, config: &Config) -> Result<Self, regex::Error> {
        Ok(Self {
            dataset,
            sessions: Arc::new(SessionStore::new(
                Duration::from_secs(config.session_ttl_secs),
                config.max_sessions,
            )),
            radius_km: config.radius_km,
            session_sanitizer: Regex::new(r"^[\w-]{1,64}$")?,
        })
    }

    /// Parses the query parameters and returns a `hashmap` of key pair values.
    /// Returns `None` if the parameters are malformed.
    fn parse_params(text: Option<&str>) -> Option<HashMap<String, String>> {
        let mut map: HashMap<String, String> = HashMap::new();
        let Some(text) = text else {
            return Some(map);
        };
        for pair in text.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=')?;
            map.insert(Self::decode_component(key), Self::decode_component(value));
        }
        Some(map)
    }

    /// Form decoding: `+` is a space, then percent escapes.
    fn decode_component(text: &str) -> String {
        decode(&text.replace('+', " ")).to_string()
    }

    /// Resolves `name` against the dataset. Unknown names are a 404.
    fn lookup_centre(&self, map: &HashMap<String, String>) -> Result<&Centre, HttpResult> {
        let Some(name) = map.get("name") else {
            return Err(Self::bad_request("name not provided."));
        };
        match self.dataset.get(name.trim()) {
            Some(centre) => Ok(centre),
            None => Err(Self::not_found("Unknown centre")),
        }
    }

    /// `date` as YYYY-MM-DD, or today in Singapore when absent.
    fn date_param(map: &HashMap<String, String>) -> Result<NaiveDate, HttpResult> {
        match map.get("date") {
            None => Ok(sg_date_now()),
            Some(date) => NaiveDate::from_str(date).map_err(|_| Self::bad_request("Malformed Date")),
        }
    }

    fn float_param(map: &HashMap<String, String>, key: &str) -> Result<Option<f64>, HttpResult> {
        match map.get(key) {
            None => Ok(None),
            Some(value) => match f64::from_str(value) {
                Ok(value) if value.is_finite() => Ok(Some(value)),
                _ => Err(Self::bad_request(&format!("Malformed {}", key))),
            },
        }
    }

    fn session_param<'a>(&self, map: &'a HashMap<String, String>) -> Result<&'a str, HttpResult> {
        let Some(session) = map.get("session") else {
            return Err(Self::bad_request("session not provided."));
        };
        if !self.session_sanitizer.is_match(session) {
            return Err(Self::bad_request("Malformed Session"));
        }
        Ok(session.as_str())
    }

    /// The /api/centres endpoint. Every centre name, sorted.
    fn centres(&self) -> HttpResult {
        Self::ok_data(self.dataset.names_sorted())
    }

    /// The /api/status endpoint.
    ///
    /// Requires `name`, optional `date`. Reports whether the centre is open,
    /// which windows cover the date and which ones are still to come.
    fn status(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let centre = match self.lookup_centre(&map) {
            Ok(centre) => centre,
            Err(res) => return res,
        };
        let date = match Self::date_param(&map) {
            Ok(date) => date,
            Err(res) => return res,
        };
        Self::ok_data(StatusResponse::new(centre, date))
    }

    /// The /api/nearby endpoint.
    ///
    /// Open centres around the selected one. `lat` and `lon` move the
    /// reference point (both or neither), `radius` overrides the default.
    fn nearby(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let centre = match self.lookup_centre(&map) {
            Ok(centre) => centre,
            Err(res) => return res,
        };
        let date = match Self::date_param(&map) {
            Ok(date) => date,
            Err(res) => return res,
        };
        let (lat, lon) = match (Self::float_param(&map, "lat"), Self::float_param(&map, "lon")) {
            (Ok(lat), Ok(lon)) => (lat, lon),
            (Err(res), _) | (_, Err(res)) => return res,
        };
        let reference = match (lat, lon) {
            (None, None) => centre.location(),
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Self::bad_request("Coordinates out of range");
                }
                Coordinate::new(lat, lon)
            }
            _ => return Self::bad_request("lat and lon must be provided together."),
        };
        let radius_km = match Self::float_param(&map, "radius") {
            Ok(None) => self.radius_km,
            Ok(Some(radius)) if radius > 0.0 => radius,
            Ok(Some(_)) => return Self::bad_request("radius must be positive."),
            Err(res) => return res,
        };

        let nearby = nearby_open(
            self.dataset.centres(),
            reference,
            centre.name(),
            radius_km,
            date,
        );
        Self::ok_data(NearbyResponse::new(
            centre.name(),
            date,
            reference,
            radius_km,
            nearby,
        ))
    }

    /// The /api/map endpoint. Every centre with its open flag for `date`.
    fn map(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let date = match Self::date_param(&map) {
            Ok(date) => date,
            Err(res) => return res,
        };
        let markers: Vec<MapMarker> = self
            .dataset
            .centres()
            .iter()
            .map(|centre| MapMarker::new(centre, date))
            .collect();
        Self::ok_data(markers)
    }

    /// The /api/calendar endpoint.
    ///
    /// Upcoming closures of one centre as an .ics attachment. 204 when there
    /// is nothing to export.
    fn calendar(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let centre = match self.lookup_centre(&map) {
            Ok(centre) => centre,
            Err(res) => return res,
        };
        let date = match Self::date_param(&map) {
            Ok(date) => date,
            Err(res) => return res,
        };
        let upcoming = centre.schedule().upcoming_closures(date);
        if upcoming.is_empty() {
            return Self::no_data();
        }
        let events = closure_events(centre.name(), &upcoming);
        let body = closures_calendar(&events, Utc::now());

        let mut res = Response::new(Full::new(Bytes::from(body)));
        let headers = res.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/calendar; charset=utf-8"),
        );
        if let Ok(value) =
            HeaderValue::from_str(&format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME))
        {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        Ok(res)
    }

    /// GET /api/favourites. The session's list, empty for a new session.
    fn favourites(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let session = match self.session_param(&map) {
            Ok(session) => session,
            Err(res) => return res,
        };
        let favourites = self.sessions.favourites(session);
        Self::ok_data(FavouritesResponse::new(session, None, favourites.names()))
    }

    /// POST /api/favourites. Adds `name` once; repeated adds are no-ops.
    fn add_favourite(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let session = match self.session_param(&map) {
            Ok(session) => session,
            Err(res) => return res,
        };
        let centre = match self.lookup_centre(&map) {
            Ok(centre) => centre,
            Err(res) => return res,
        };
        let (added, favourites) = self.sessions.add_favourite(session, centre.name());
        Self::ok_data(FavouritesResponse::new(
            session,
            Some(added),
            favourites.names(),
        ))
    }

    /// DELETE /api/favourites. Ends the session and discards its list.
    fn end_session(&self, query: Option<&str>) -> HttpResult {
        let Some(map) = Self::parse_params(query) else {
            return Self::bad_request("Malformed Parameters.");
        };
        let session = match self.session_param(&map) {
            Ok(session) => session,
            Err(res) => return res,
        };
        if !self.sessions.end_session(session) {
            return Self::not_found("Unknown session");
        }
        Self::no_data()
    }

    fn route(&self, method: &Method, path: &str, query: Option<&str>) -> HttpResult {
        log::debug!("{} {}", method, path);
        match (method, path) {
            (&Method::GET, "/api/centres") => self.centres(),
            (&Method::GET, "/api/status") => self.status(query),
            (&Method::GET, "/api/nearby") => self.nearby(query),
            (&Method::GET, "/api/map") => self.map(query),
            (&Method::GET, "/api/calendar") => self.calendar(query),
            (&Method::GET, "/api/favourites") => self.favourites(query),
            (&Method::POST, "/api/favourites") => self.add_favourite(query),
            (&Method::DELETE, "/api/favourites") => self.end_session(query),
            _ => Self::not_found(""),
        }
    }

    fn with_status(status: StatusCode, body: Bytes) -> HttpResult {
        let mut res = Response::new(Full::new(body));
        *res.status_mut() = status;
        Ok(res)
    }

    fn error_body(message: &str) -> Bytes {
        Bytes::from(serde_json::json!({ "error": message }).to_string())
    }

    /// Return a 200 OK response with the data provided.
    fn ok_data<T: Serialize>(body: T) -> HttpResult {
        match serde_json::to_string(&body) {
            Ok(data) => {
                let mut res = Response::new(Full::new(Bytes::from(data)));
                res.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Ok(res)
            }
            Err(err) => Self::server_error(&err.to_string()),
        }
    }

    /// Return a 500 Internal Server Error response with the message provided.
    fn server_error(message: &str) -> HttpResult {
        log::warn!("Internal error: {}", message);
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, Self::error_body(message))
    }

    /// Return a 404 Not Found response with the message provided. Leave it
    /// empty for no message.
    fn not_found(message: &str) -> HttpResult {
        let body = if message.is_empty() {
            Bytes::new()
        } else {
            Self::error_body(message)
        };
        Self::with_status(StatusCode::NOT_FOUND, body)
    }

    /// Return a 400 Bad Request response with the message provided.
    fn bad_request(message: &str) -> HttpResult {
        Self::with_status(StatusCode::BAD_REQUEST, Self::error_body(message))
    }

    /// Return a 204 No Content response.
    fn no_data() -> HttpResult {
        Self::with_status(StatusCode::NO_CONTENT, Bytes::new())
    }
}

impl Service<Request<Incoming>> for Server {
    type Response = Response<Full<Bytes>>;
    type Error = hyper::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let res = self.route(req.method(), req.uri().path(), req.uri().query());
        Box::pin(async { res })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::date_field::DateNormalizer;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    const TABLE: &str = "name,latitude_hc,longitude_hc,\
q1_cleaningstartdate,q1_cleaningenddate,remarks_q1,\
q2_cleaningstartdate,q2_cleaningenddate,remarks_q2,\
q3_cleaningstartdate,q3_cleaningenddate,remarks_q3,\
q4_cleaningstartdate,q4_cleaningenddate,remarks_q4,\
other_works_startdate,other_works_enddate,remarks_other_works
Alpha Centre,1.300,103.800,01/01/2025,05/01/2025,Quarterly cleaning,01/04/2025,03/04/2025,,TBC,TBC,,,,,,,
Beta Centre,1.305,103.805,02/01/2025,04/01/2025,,,,,,,,,,,,,
Gamma Centre,1.3010,103.8000,,,,,,,,,,,,,,,
Delta Centre,1.400,103.900,,,,,,,,,,,,,,,";

    fn server() -> Server {
        let normalizer = DateNormalizer::new("%d/%m/%Y", "TBC").unwrap();
        let dataset = crate::dataset::loader::parse_table(TABLE, &normalizer).unwrap();
        Server::setup(Arc::new(dataset), &Config::default()).unwrap()
    }

    async fn call(server: &Server, method: Method, path: &str, query: Option<&str>) -> (StatusCode, Bytes) {
        let res = server.route(&method, path, query).unwrap();
        let status = res.status();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    async fn json(server: &Server, path: &str, query: &str) -> Value {
        let (status, body) = call(server, Method::GET, path, Some(query)).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn lists_sorted_centre_names() {
        let (status, body) = call(&server(), Method::GET, "/api/centres", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(names, vec!["Alpha Centre", "Beta Centre", "Delta Centre", "Gamma Centre"]);
    }

    #[tokio::test]
    async fn status_reports_closure_and_upcoming() {
        let body = json(&server(), "/api/status", "name=Alpha+Centre&date=2025-01-03").await;
        assert_eq!(body["open"], Value::Bool(false));
        assert_eq!(body["advisory"], "closed");
        assert_eq!(body["pending_dates"], 2);
        assert_eq!(body["closed_on_date"].as_array().unwrap().len(), 1);
        assert_eq!(body["upcoming"][0]["start"], "2025-04-01");
        assert_eq!(body["upcoming"][0]["kind"], "Cleaning");
    }

    #[tokio::test]
    async fn status_separates_no_records_from_confirmed_open() {
        let server = server();
        let gamma = json(&server, "/api/status", "name=Gamma%20Centre&date=2025-01-03").await;
        assert_eq!(gamma["open"], Value::Bool(true));
        assert_eq!(gamma["advisory"], "no_recorded_closures");

        let beta = json(&server, "/api/status", "name=Beta%20Centre&date=2025-02-01").await;
        assert_eq!(beta["open"], Value::Bool(true));
        assert_eq!(beta["advisory"], "confirmed_open");
    }

    #[tokio::test]
    async fn nearby_skips_closed_and_far_centres() {
        let server = server();
        let body = json(&server, "/api/nearby", "name=Alpha+Centre&date=2025-01-03").await;
        let names: Vec<&str> = body["centres"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Gamma Centre"]);

        let body = json(&server, "/api/nearby", "name=Alpha+Centre&date=2025-01-10").await;
        let names: Vec<&str> = body["centres"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Gamma Centre", "Beta Centre"]);
    }

    #[tokio::test]
    async fn nearby_validates_location_and_radius() {
        let server = server();
        let (status, _) = call(&server, Method::GET, "/api/nearby", Some("name=Alpha+Centre&lat=1.3")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&server, Method::GET, "/api/nearby", Some("name=Alpha+Centre&radius=-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&server, Method::GET, "/api/nearby", Some("name=Alpha+Centre&lat=abc&lon=1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = json(&server, "/api/nearby", "name=Alpha+Centre&lat=1.4&lon=103.9&radius=0.5&date=2025-01-10").await;
        assert_eq!(body["centres"][0]["name"], "Delta Centre");
    }

    #[tokio::test]
    async fn unknown_centre_and_bad_date() {
        let server = server();
        let (status, _) = call(&server, Method::GET, "/api/status", Some("name=Nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&server, Method::GET, "/api/status", Some("name=Alpha+Centre&date=03-01-2025")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&server, Method::GET, "/api/status", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&server, Method::DELETE, "/api/status", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn map_colours_every_centre() {
        let body = json(&server(), "/api/map", "date=2025-01-03").await;
        let markers = body.as_array().unwrap();
        assert_eq!(markers.len(), 4);
        let closed: Vec<&str> = markers
            .iter()
            .filter(|m| m["open"] == Value::Bool(false))
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(closed, vec!["Alpha Centre", "Beta Centre"]);
    }

    #[tokio::test]
    async fn calendar_exports_upcoming_closures() {
        let server = server();
        let res = server
            .route(&Method::GET, "/api/calendar", Some("name=Alpha+Centre&date=2024-12-01"))
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/calendar; charset=utf-8");
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.matches("BEGIN:VEVENT").count(), 2);
        assert!(text.contains("SUMMARY:Alpha Centre - Cleaning"));

        let (status, _) = call(&server, Method::GET, "/api/calendar", Some("name=Gamma+Centre")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn favourites_are_per_session_and_deduplicated() {
        let server = server();
        let (status, _) = call(&server, Method::POST, "/api/favourites", Some("session=s1&name=Alpha+Centre")).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&server, Method::POST, "/api/favourites", Some("session=s1&name=Alpha+Centre")).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["added"], Value::Bool(false));
        assert_eq!(body["favourites"], serde_json::json!(["Alpha Centre"]));

        let other = json(&server, "/api/favourites", "session=s2").await;
        assert_eq!(other["favourites"], serde_json::json!([]));

        let (status, _) = call(&server, Method::POST, "/api/favourites", Some("session=s1&name=Nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&server, Method::GET, "/api/favourites", Some("session=bad%20id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ended_session_returns_an_empty_list() {
        let server = server();
        call(&server, Method::POST, "/api/favourites", Some("session=s1&name=Alpha+Centre")).await;
        let (status, _) = call(&server, Method::DELETE, "/api/favourites", Some("session=s1")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let body = json(&server, "/api/favourites", "session=s1").await;
        assert_eq!(body["favourites"], serde_json::json!([]));
        let (status, _) = call(&server, Method::DELETE, "/api/favourites", Some("session=s1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn params_keep_equals_signs_and_decode_plus_in_keys() {
        let map = Server::parse_params(Some("note=a%3Db=c&my+key=x+y&name=Alpha%20Centre")).unwrap();
        assert_eq!(map["note"], "a=b=c");
        assert_eq!(map["my key"], "x y");
        assert_eq!(map["name"], "Alpha Centre");
        assert!(Server::parse_params(Some("name")).is_none());
        assert!(Server::parse_params(None).unwrap().is_empty());
    }
}
