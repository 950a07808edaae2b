#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/doublesort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cross_section;
pub mod error;
pub mod observation;
pub mod panel;

pub use cross_section::{CrossSection, MarketData};
pub use error::{DataError, Result};
pub use observation::SecurityObservation;
pub use panel::{PanelConfig, prepare_market_data, prepare_panel};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
