//! Per-job scratch storage.
//!
//! Every job owns a workspace rooted at `<scratch_base>/<job_id>/` with
//! `images/`, `audio/` and `temp/` subtrees. All blob writes are atomic
//! (temp file + rename within the same subtree) and return absolute
//! paths. The final video is promoted out of scratch into
//! `<videos_base>/<job_id>/final.mp4`; the scratch tree is destroyed on
//! terminal status unless the job asked for retention.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod scratch;

pub use scratch::{JobScratch, ScratchStore, FINAL_VIDEO_NAME};
