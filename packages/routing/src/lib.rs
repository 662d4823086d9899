#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route provider adapter.
//!
//! Fetches candidate routes between two points from an OSRM server and
//! converts them into [`RouteCandidate`] values with formatted turn-by-turn
//! steps. The provider is a black box: this crate never retries and never
//! asks for more alternatives than the server returns. A failed or empty
//! response surfaces as [`RoutingError`], which callers report as "no
//! routes".

pub mod instructions;
pub mod osrm;
pub mod service;

use async_trait::async_trait;
use saferoute_accident_models::Coordinate;
use saferoute_risk_models::RouteCandidate;
use thiserror::Error;

pub use instructions::{ManeuverIcon, format_instruction};
pub use osrm::OsrmClient;

/// Errors from route provider calls.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Route provider returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider found no route between the points.
    #[error("No routes found between these coordinates ({code})")]
    NoRoutes {
        /// Provider status code, e.g. `"NoRoute"`.
        code: String,
    },
}

/// A source of candidate routes.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Returns candidate routes from `start` to `end`, in provider order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the provider is unreachable, answers
    /// with an error, or finds no route.
    async fn fetch_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Vec<RouteCandidate>, RoutingError>;
}
