//! End-to-end tests of `seq-api` against the mock server.

#[cfg(test)]
mod tests;
