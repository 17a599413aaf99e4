//! # WebP Shelf
//!
//! A per-session image converter with time-limited storage. Users upload
//! JPEG, PNG, GIF or WebP images; each is re-encoded as WebP and kept under a
//! name that ties it to the uploading session. Sessions can list, download,
//! bundle and delete only their own files, and everything expires after a
//! retention period.
//!
//! # Request Flow
//!
//! ```text
//! upload    bytes  →  uploads/{token}_{name}  →  converted/{owner}_{token}_{ts}.webp
//! list      owner  →  owned artifacts, newest first
//! download  name   →  authorised bytes (one file, or a zip of all)
//! every request    →  maybe_cleanup (at most once per interval)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`service`] | Request-level operations; the only entry point a transport needs |
//! | [`convert`] | Upload validation, decode, WebP encode, atomic artifact write |
//! | [`store`] | Owner-scoped listing, reads, deletes and zip bundling |
//! | [`retention`] | Throttled age-based sweeping of the storage directories |
//! | [`naming`] | Owner ids, artifact names, and the prefix authorisation rule |
//! | [`config`] | `webp-shelf.toml` loading over stock defaults, validation |
//! | [`imaging`] | Decode and WebP encode behind the [`imaging::ImageCodec`] trait |
//! | [`clock`] | Injectable time source |
//! | [`types`] | Shared result types, serialized by the CLI's `--json` mode |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Ownership Lives in the File Name
//!
//! There is no database. An artifact belongs to the owner whose id prefixes its
//! name, and [`naming::PrefixAuthorizer`] re-parses the whole name rather than
//! checking a bare prefix, so `user` can never reach files of `user_abc`.
//! Caller-supplied names are reduced to their final path component before any
//! check, which rules out traversal.
//!
//! ## Cleanup Piggybacks on Requests
//!
//! No background worker. Each request asks the [`retention::RetentionCleaner`]
//! whether the cleanup interval has passed, using the mtime of a sentinel file
//! as the last-run marker. The check is one `stat`; the sweep itself runs on
//! at most one request per interval per process.
//!
//! ## Lossy WebP Through libwebp
//!
//! Decoding uses the pure-Rust `image` crate. Its WebP encoder is lossless
//! only, which makes photographic uploads several times larger than the
//! JPEG they came from, so encoding goes through the `webp` crate's bundled
//! libwebp at the configured quality. Quality 100 selects lossless output.
//!
//! ## Artifacts Appear Atomically
//!
//! Converted bytes go to a hidden temp file in the target directory, get their
//! mtime stamped, and are then renamed into place without clobbering. Listers
//! never see a partial file, and hidden temp names never pass authorisation.

pub mod clock;
pub mod config;
pub mod convert;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod retention;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
