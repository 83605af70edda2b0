//! Integration tests for stratus-gateway
//!
//! Uses wiremock to simulate the cloud gateway service and verifies
//! end-to-end behavior of listings, deletion and throttling.


mod test_delete;
mod test_listing;
mod test_throttling;
