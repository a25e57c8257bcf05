//! Fuzz testing for request validation.
//!
//! Validation functions must never panic on arbitrary input, including
//! multi-byte characters and very long strings.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_validation
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use site_backend::models::{ChangePasswordRequest, LoginRequest};
use site_backend::validation::{
    validate_change_password, validate_content, validate_lang_code, validate_language_name,
    validate_login, validate_property,
};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = validate_property(s);
    let _ = validate_lang_code(s);
    let _ = validate_content(s);
    let _ = validate_language_name(s);

    let mid = s
        .char_indices()
        .nth(s.chars().count() / 2)
        .map_or(s.len(), |(i, _)| i);
    let (left, right) = s.split_at(mid);
    let _ = validate_login(&LoginRequest {
        email: left.to_string(),
        password: right.to_string(),
    });
    let _ = validate_change_password(&ChangePasswordRequest {
        current_password: left.to_string(),
        new_password: right.to_string(),
    });
});
