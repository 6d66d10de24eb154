use std::path::PathBuf;
use std::time::Duration;

use crate::extract::SelectorConfig;
use crate::render::{RenderRequest, WaitConfig};

const TARGET_URL: &str = "https://www.yogonet.com/international/";
const DATASET: &str = "news_data";
const TABLE: &str = "yogonet_news";

const DEFAULT_DATA_DIR: &str = "data";
/// Overrides where dataset files live (the deploy-target knob of this pipeline).
pub const DATA_DIR_ENV: &str = "NEWS_DATA_DIR";

// Portal markup: each article module is one container; the image selector also
// doubles (with [src]) as the "assets resolved" readiness probe.
const CONTAINER_SELECTOR: &str = "div.contenedor_dato_modulo";
const KICKER_SELECTOR: &str = "div.volanta";
const ANCHOR_SELECTOR: &str = "h2.titulo a";
const IMAGE_SELECTOR: &str = "img";
const READY_SELECTOR: &str = "body";
const LOADED_SELECTOR: &str = "div.contenedor_dato_modulo img[src]";

const READY_TIMEOUT: Duration = Duration::from_secs(20);
const ARTICLE_TIMEOUT: Duration = Duration::from_secs(15);
const SETTLE_DELAY: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runtime configuration for one pipeline invocation.
pub struct Config {
    pub target_url: String,
    pub dataset: String,
    pub table: String,
    pub data_dir: PathBuf,
    pub selectors: SelectorConfig,
    pub waits: WaitConfig,
    /// Cap on how many article containers are processed (None = all).
    pub limit: Option<usize>,
}

impl Config {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));

        Config {
            target_url: TARGET_URL.to_string(),
            dataset: DATASET.to_string(),
            table: TABLE.to_string(),
            data_dir,
            selectors: SelectorConfig {
                container: CONTAINER_SELECTOR.to_string(),
                kicker: KICKER_SELECTOR.to_string(),
                anchor: ANCHOR_SELECTOR.to_string(),
                image: IMAGE_SELECTOR.to_string(),
            },
            waits: WaitConfig {
                ready_timeout: READY_TIMEOUT,
                article_timeout: ARTICLE_TIMEOUT,
                settle_delay: SETTLE_DELAY,
                poll_interval: POLL_INTERVAL,
            },
            limit: None,
        }
    }

    /// One dataset maps to one database file under the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite", self.dataset))
    }

    pub fn render_request(&self) -> RenderRequest {
        RenderRequest {
            url: self.target_url.clone(),
            ready_selector: READY_SELECTOR.to_string(),
            loaded_selector: LOADED_SELECTOR.to_string(),
            waits: self.waits.clone(),
        }
    }
}
