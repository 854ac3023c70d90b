//! Album collage generation for `/generate_chart`.
//!
//! Top albums come from Last.fm, covers are downloaded concurrently, sorted by
//! average colour and laid out along zigzag diagonals so neighbouring tiles
//! blend into each other.

pub mod color;
pub mod layout;
pub mod render;

use futures::future::join_all;
use image::RgbImage;
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::lastfm::{Album, CoverSize, LastFmClient, ALBUM_BUFFER};
use crate::utils::epoch_millis;

pub const MAX_GRID_SIDE: u32 = 50;
/// At or above this many tiles per side the smaller cover art is used.
const MEDIUM_COVER_THRESHOLD: u32 = 30;

/// Raw query string of `/generate_chart`; validated into a [`ChartRequest`].
#[derive(Deserialize, Debug, Default)]
pub struct ChartQuery {
    pub username: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChartRequest {
    pub username: String,
    pub cols: u32,
    pub rows: u32,
}

impl ChartRequest {
    pub fn cells(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    pub fn cover_size(&self) -> CoverSize {
        if self.cols >= MEDIUM_COVER_THRESHOLD || self.rows >= MEDIUM_COVER_THRESHOLD {
            CoverSize::Medium
        } else {
            CoverSize::Large
        }
    }
}

impl TryFrom<ChartQuery> for ChartRequest {
    type Error = AppError;

    fn try_from(query: ChartQuery) -> Result<Self, Self::Error> {
        let bad_request = || AppError::BadRequest("Bad request. Try reloading the page.".to_string());
        let side = |v: Option<String>| {
            v.and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|n| (1..=MAX_GRID_SIDE).contains(n))
        };

        let username = query.username.filter(|u| !u.is_empty()).ok_or_else(bad_request)?;
        let cols = side(query.x).ok_or_else(bad_request)?;
        let rows = side(query.y).ok_or_else(bad_request)?;
        Ok(ChartRequest { username, cols, rows })
    }
}

struct Cover {
    image: RgbImage,
    hsv: color::Hsv,
}

pub async fn generate_chart(
    http: &reqwest::Client,
    lastfm: &LastFmClient,
    request: &ChartRequest,
) -> Result<Vec<u8>, AppError> {
    let cells = request.cells();

    let albums = lastfm
        .top_albums(&request.username, cells + ALBUM_BUFFER)
        .await
        .map_err(|e| {
            warn!("Fetching top albums for {} failed: {}", request.username, e);
            AppError::Internal("There was an error getting the albums. Try again or contact me.".to_string())
        })?;

    if albums.is_empty() {
        return Err(AppError::BadRequest(
            "No albums were found. Check the Last.fm username".to_string(),
        ));
    }
    if albums.len() < cells {
        return Err(AppError::BadRequest(
            "Not enough albums to generate a chart. Try choosing a smaller size.".to_string(),
        ));
    }

    let downloads = download_covers(http, &albums, request.cover_size()).await;
    info!(
        "Downloaded {}/{} covers for {}",
        downloads.iter().filter(|d| d.is_some()).count(),
        albums.len(),
        request.username
    );

    let (cols, rows) = (request.cols, request.rows);
    tokio::task::spawn_blocking(move || compose(downloads, cols, rows))
        .await
        .map_err(|e| {
            warn!("Chart composition task failed: {}", e);
            AppError::Internal(
                "There was an error generating the chart. Try again or contact me.".to_string(),
            )
        })?
}

/// Raw cover bytes in album order; `None` where the download failed.
async fn download_covers(http: &reqwest::Client, albums: &[Album], size: CoverSize) -> Vec<Option<Vec<u8>>> {
    let fetches = albums.iter().map(|album| async move {
        let url = album.images.url(size);
        debug!("Fetching cover of {} - {} ({} plays)", album.artist, album.title, album.playcount);
        let result = async {
            let response = http.get(url).send().await?.error_for_status()?;
            response.bytes().await
        }
        .await;

        match result {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!("Cover download for {} - {} failed: {}", album.artist, album.title, e);
                None
            }
        }
    });
    join_all(fetches).await
}

fn compose(downloads: Vec<Option<Vec<u8>>>, cols: u32, rows: u32) -> Result<Vec<u8>, AppError> {
    let cells = (cols * rows) as usize;

    let mut covers: Vec<Cover> = downloads
        .into_iter()
        .flatten()
        .filter_map(|bytes| match image::load_from_memory(&bytes) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                debug!("Undecodable cover: {}", e);
                None
            }
        })
        .take(cells)
        .map(|image| {
            let hsv = color::hsv(color::average_color(&image));
            Cover { image, hsv }
        })
        .collect();

    if covers.len() < cells {
        return Err(AppError::Internal(
            "Failed to download enough album covers. Try again or contact me.".to_string(),
        ));
    }

    covers.sort_by(|a, b| a.hsv.chart_order(&b.hsv));
    let images: Vec<RgbImage> = layout::rearrange(covers, cols as usize, rows as usize)
        .into_iter()
        .map(|c| c.image)
        .collect();

    let chart = render::tile(&images, cols, rows);
    render::encode_jpeg(&chart).map_err(|e| {
        warn!("JPEG encoding failed: {}", e);
        AppError::Internal("There was an error generating the image. Try again or contact me.".to_string())
    })
}

/// Appends one `username x y timestamp` line per chart request.
pub async fn log_request(path: &str, request: &ChartRequest) {
    let line = format!("{} {} {} {}\n", request.username, request.cols, request.rows, epoch_millis());
    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = result {
        warn!("Could not write chart request log {}: {}", path, e);
    }
}
