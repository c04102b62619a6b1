//! Pipeline stages for book compilation.
//!
//! Each submodule implements exactly one step, so each can be tested without
//! the others and without a network.
//!
//! ## Data Flow
//!
//! ```text
//! resolve ──▶ budget ──▶ paginate ──▶ bible ──▶ illustrate ──▶ (compose)
//! (drafts)   (pages/ch)  (text LLM)   (anchor)  (image API,
//!                                                placement)
//! ```
//!
//! 1. [`resolve`]  — pick the authoritative text variant of every chapter
//! 2. [`budget`]   — split the page cap across chapters by text length
//! 3. [`paginate`] — ask the text model to split each chapter; validate the
//!    reply and fall back to a single page when it breaks the contract
//! 4. [`bible`]    — character bible and reference image for visual continuity
//! 5. [`illustrate`] — one image per page under a concurrency bound
//! 6. [`placement`]  — choose the text band from the generated image
//! 7. [`postprocess`] — deterministic cleanup of model replies
//!
//! Laying out and writing the PDF lives in [`crate::compose`].

pub mod bible;
pub mod budget;
pub mod illustrate;
pub mod paginate;
pub mod placement;
pub mod postprocess;
pub mod resolve;
