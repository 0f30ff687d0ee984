//! Craftify Sample
//!
//! The conditional API chain:
//!
//! ```text
//! fetch_initial -> wait_and_check_minute -> print_word_only            -> end
//!                                        \-> send_query_with_first_word -/
//! ```
//!
//! `fetch_initial` publishes the endpoint's response body. The branch task
//! waits, then picks `print_word_only` on an odd minute and
//! `send_query_with_first_word` on an even one. Both read the body's first
//! word; only the latter calls the endpoint again with it. `end` runs after
//! whichever path was taken.

mod chain;
mod clock;
mod fetch;

pub use chain::{
  ApiChain, DEFAULT_ENDPOINT, END, FETCH_INITIAL, FIRST_WORD_KEY, PRINT_WORD_ONLY, QUERY_RESPONSE_KEY,
  RESPONSE_BODY_KEY, SEND_QUERY_WITH_FIRST_WORD, SampleConfig, WAIT_AND_CHECK_MINUTE, WORKFLOW_ID,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use fetch::{FetchError, FetchResponse, Fetcher, HttpFetcher};
