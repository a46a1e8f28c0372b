//! End-to-end workflow scenarios over stub capabilities.

mod stubs;
