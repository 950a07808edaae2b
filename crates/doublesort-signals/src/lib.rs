#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/doublesort/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bucket;
pub mod sorter;

pub use bucket::{Axis, Bucket, BucketEntry, BucketLabel, BucketSet, ParseLabelError, Position};
pub use sorter::{BucketSorter, SignalError, SorterConfig, slice_boundary};
