use std::str::FromStr;

use log::{debug, warn};
use reqwest::StatusCode;
use url::Url;

use crate::client::{ClientError, Panel, Ui, INTERNAL_ERROR_MESSAGE};

const SQUARE_SIZES: [&str; 4] = ["5x5", "10x10", "20x20", "30x30"];
const DESKTOP_SIZES: [&str; 2] = ["16x9", "32x18"];

/// A "WxH" selection; both sides are positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSize {
    pub x: u32,
    pub y: u32,
}

impl FromStr for GridSize {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once('x').ok_or(())?;
        let x: u32 = x.trim().parse().map_err(|_| ())?;
        let y: u32 = y.trim().parse().map_err(|_| ())?;
        if x == 0 || y == 0 {
            return Err(());
        }
        Ok(GridSize { x, y })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridLayout {
    Square,
    Desktop,
}

impl GridLayout {
    pub fn options(&self) -> &'static [&'static str] {
        match self {
            GridLayout::Square => &SQUARE_SIZES,
            GridLayout::Desktop => &DESKTOP_SIZES,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ChartOutcome {
    /// Missing username or unusable size, nothing was sent.
    Skipped,
    Opened,
    /// Server answered with an error message.
    Rejected(String),
    /// Request never completed.
    Failed,
}

pub struct ChartController<U: Ui> {
    http: reqwest::Client,
    endpoint: Url,
    layout: GridLayout,
    selection: String,
    pub ui: U,
}

impl<U: Ui> ChartController<U> {
    pub fn new(http: reqwest::Client, server_url: &str, ui: U) -> Result<Self, ClientError> {
        let endpoint = Url::parse(server_url)?.join("/generate_chart")?;
        Ok(Self {
            http,
            endpoint,
            layout: GridLayout::Square,
            selection: SQUARE_SIZES[0].to_string(),
            ui,
        })
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// Switching layout resets the selection to that layout's first size.
    pub fn select_layout(&mut self, layout: GridLayout) {
        self.layout = layout;
        self.selection = layout.options()[0].to_string();
    }

    pub fn select_size(&mut self, value: &str) {
        self.selection = value.to_string();
    }

    fn loading(&mut self) {
        self.ui.set_visible(Panel::GenerateButton, false);
        self.ui.set_visible(Panel::Loader, true);
    }

    fn finished_loading(&mut self) {
        self.ui.set_visible(Panel::GenerateButton, true);
        self.ui.set_visible(Panel::Loader, false);
    }

    pub async fn generate(&mut self, username: &str) -> ChartOutcome {
        let Ok(size) = self.selection.parse::<GridSize>() else {
            debug!("Ignoring unusable grid size {:?}", self.selection);
            return ChartOutcome::Skipped;
        };
        if username.is_empty() {
            return ChartOutcome::Skipped;
        }

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("x", &size.x.to_string())
            .append_pair("y", &size.y.to_string())
            .append_pair("username", username);

        self.loading();
        let result = self.fetch(url).await;
        self.finished_loading();

        match result {
            Ok((status, body)) if status == StatusCode::OK => {
                self.ui.open_image(&body);
                ChartOutcome::Opened
            }
            Ok((status, body)) => {
                let message = String::from_utf8_lossy(&body).into_owned();
                debug!("Chart request answered {}: {}", status, message);
                self.ui.toast(&message);
                ChartOutcome::Rejected(message)
            }
            Err(e) => {
                warn!("Chart request failed: {}", e);
                self.ui.toast(INTERNAL_ERROR_MESSAGE);
                ChartOutcome::Failed
            }
        }
    }

    async fn fetch(&self, url: Url) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::recording::{Event, RecordingUi};
    use crate::testing::{self, FakeUpstream};
    use crate::web::{router, AppState};
    use axum::{extract::Query, http::StatusCode as AxumStatus, routing::get, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn controller(server_url: &str) -> ChartController<RecordingUi> {
        ChartController::new(reqwest::Client::new(), server_url, RecordingUi::default()).unwrap()
    }

    /// Records every query and answers with a fixed status and body.
    async fn canned_server(status: AxumStatus, body: &'static [u8]) -> (String, Arc<Mutex<Vec<HashMap<String, String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let app = Router::new().route(
            "/generate_chart",
            get(move |Query(q): Query<HashMap<String, String>>| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(q);
                    (status, body)
                }
            }),
        );
        (testing::spawn_app(app).await, seen)
    }

    #[test]
    fn grid_size_parsing() {
        assert_eq!("10x10".parse::<GridSize>(), Ok(GridSize { x: 10, y: 10 }));
        assert_eq!("16x9".parse::<GridSize>(), Ok(GridSize { x: 16, y: 9 }));
        assert!("0x5".parse::<GridSize>().is_err());
        assert!("5".parse::<GridSize>().is_err());
        assert!("axb".parse::<GridSize>().is_err());
    }

    #[test]
    fn layout_switch_resets_selection() {
        let mut chart = controller("http://localhost:8080");
        assert_eq!(chart.selection(), "5x5");
        chart.select_layout(GridLayout::Desktop);
        assert_eq!(chart.selection(), "16x9");
        chart.select_size("32x18");
        chart.select_layout(GridLayout::Square);
        assert_eq!(chart.selection(), "5x5");
        assert_eq!(chart.layout().options().len(), 4);
    }

    #[tokio::test]
    async fn empty_username_sends_nothing() {
        let (url, seen) = canned_server(AxumStatus::OK, b"img").await;
        let mut chart = controller(&url);
        assert_eq!(chart.generate("").await, ChartOutcome::Skipped);
        assert!(seen.lock().unwrap().is_empty());
        assert!(chart.ui.events.is_empty());
    }

    #[tokio::test]
    async fn selection_is_sent_as_x_and_y() {
        let (url, seen) = canned_server(AxumStatus::OK, b"\xFF\xD8jpeg").await;
        let mut chart = controller(&url);
        chart.select_size("10x10");

        assert_eq!(chart.generate("rj").await, ChartOutcome::Opened);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["x"], "10");
        assert_eq!(seen[0]["y"], "10");
        assert_eq!(seen[0]["username"], "rj");
        assert!(chart.ui.events.contains(&Event::OpenImage(b"\xFF\xD8jpeg".to_vec())));
        assert_eq!(chart.ui.visible(Panel::Loader), Some(false));
        assert_eq!(chart.ui.visible(Panel::GenerateButton), Some(true));
    }

    #[tokio::test]
    async fn error_body_is_toasted_verbatim() {
        let (url, _) = canned_server(AxumStatus::BAD_REQUEST, b"No albums were found. Check the Last.fm username").await;
        let mut chart = controller(&url);

        let outcome = chart.generate("nobody").await;
        assert_eq!(
            outcome,
            ChartOutcome::Rejected("No albums were found. Check the Last.fm username".into())
        );
        assert_eq!(chart.ui.toasts(), vec!["No albums were found. Check the Last.fm username"]);
    }

    #[tokio::test]
    async fn unreachable_server_toasts_generic_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut chart = controller(&url);
        assert_eq!(chart.generate("rj").await, ChartOutcome::Failed);
        assert_eq!(chart.ui.toasts(), vec![INTERNAL_ERROR_MESSAGE]);
        assert_eq!(chart.ui.visible(Panel::GenerateButton), Some(true));
    }

    #[tokio::test]
    async fn opens_chart_from_real_server() {
        let upstream = FakeUpstream::spawn().await;
        let state = AppState::new(testing::config(&upstream)).unwrap();
        let url = testing::spawn_app(router(state)).await;

        let mut chart = controller(&url);
        chart.select_size("2x2");
        assert_eq!(chart.generate("rj").await, ChartOutcome::Opened);

        let image = chart
            .ui
            .events
            .iter()
            .find_map(|e| match e {
                Event::OpenImage(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .unwrap();
        assert!(image::load_from_memory(&image).is_ok());
    }
}
