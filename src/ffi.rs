//! FFI bindings for Coach Score
//!
//! This module provides C-compatible functions for calling the engine from the
//! mobile shell. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `coach_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::pipeline::{
    activity_index_to_json, monthly_series_to_json, questionnaire_to_json, score_test_to_json,
    weekly_series_to_json, ScoreProcessor,
};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Read a required string argument, recording an error when it is missing
unsafe fn required_arg(ptr: *const c_char, name: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {name} string pointer"));
    }
    value
}

/// Read an optional string argument: NULL is `Some(None)`, invalid UTF-8 records
/// an error and yields `None`
unsafe fn optional_arg(ptr: *const c_char, name: &str) -> Option<Option<String>> {
    if ptr.is_null() {
        return Some(None);
    }
    required_arg(ptr, name).map(Some)
}

/// Parse an optional RFC 3339 timestamp; NULL means "now"
unsafe fn now_arg(ptr: *const c_char) -> Option<DateTime<Utc>> {
    if ptr.is_null() {
        return Some(Utc::now());
    }
    let raw = required_arg(ptr, "now")?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            set_last_error(&format!("Invalid timestamp {raw}: {e}"));
            None
        }
    }
}

fn to_cstr_result<E: std::fmt::Display>(result: Result<String, E>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Score a fitness test and return the submission JSON `{value, score, form}`.
///
/// # Safety
/// - `test` and `gender` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_score_test(
    test: *const c_char,
    raw_value: f64,
    age: u32,
    gender: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(test) = required_arg(test, "test") else {
        return ptr::null_mut();
    };
    let Some(gender) = required_arg(gender, "gender") else {
        return ptr::null_mut();
    };

    to_cstr_result(score_test_to_json(&test, raw_value, age, &gender))
}

/// Score questionnaire answers (JSON object) and return the score JSON.
///
/// # Safety
/// - `answers_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_questionnaire_score(answers_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json) = required_arg(answers_json, "answers JSON") else {
        return ptr::null_mut();
    };

    to_cstr_result(questionnaire_to_json(&json))
}

/// Compute the activity index from a request JSON
/// `{questionnaire, sessions, now}`.
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_activity_index(request_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(json) = required_arg(request_json, "request JSON") else {
        return ptr::null_mut();
    };

    to_cstr_result(activity_index_to_json(&json))
}

/// Weekly series of a month from a session feed JSON.
///
/// # Safety
/// - `sessions_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_weekly_series(
    sessions_json: *const c_char,
    year: i32,
    month: u32,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = required_arg(sessions_json, "sessions JSON") else {
        return ptr::null_mut();
    };

    to_cstr_result(weekly_series_to_json(&json, year, month))
}

/// Monthly series of a year from a session feed JSON.
///
/// `today` is a `YYYY-MM-DD` date, or NULL for the current UTC date.
///
/// # Safety
/// - `sessions_json` must be a valid null-terminated C string; `today` may be NULL.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_monthly_series(
    sessions_json: *const c_char,
    year: i32,
    today: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(json) = required_arg(sessions_json, "sessions JSON") else {
        return ptr::null_mut();
    };

    let today = if today.is_null() {
        Utc::now().date_naive()
    } else {
        let Some(raw) = required_arg(today, "today") else {
            return ptr::null_mut();
        };
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                set_last_error(&format!("Invalid date {raw}: {e}"));
                return ptr::null_mut();
            }
        }
    };

    to_cstr_result(monthly_series_to_json(&json, year, today))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a ScoreProcessor
pub struct ScoreProcessorHandle {
    processor: ScoreProcessor,
}

/// Create a new ScoreProcessor with the default configuration.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `coach_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn coach_processor_new() -> *mut ScoreProcessorHandle {
    clear_last_error();

    let handle = Box::new(ScoreProcessorHandle {
        processor: ScoreProcessor::new(),
    });
    Box::into_raw(handle)
}

/// Free a ScoreProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `coach_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn coach_processor_free(processor: *mut ScoreProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Score and record a fitness test; returns the stored result JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `coach_processor_new`.
/// - `test` and `gender` must be valid null-terminated C strings; `now` may be NULL.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_processor_record_test(
    processor: *mut ScoreProcessorHandle,
    test: *const c_char,
    raw_value: f64,
    age: u32,
    gender: *const c_char,
    now: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let Some(test) = required_arg(test, "test") else {
        return ptr::null_mut();
    };
    let Some(gender) = required_arg(gender, "gender") else {
        return ptr::null_mut();
    };
    let Some(at) = now_arg(now) else {
        return ptr::null_mut();
    };

    to_cstr_result(
        handle
            .processor
            .record_test_raw(&test, raw_value, age, &gender, at)
            .and_then(|result| Ok(serde_json::to_string(&result)?)),
    )
}

/// Resolve the activity index from raw backend responses.
///
/// Pass NULL for `questionnaire_json` or `sessions_json` when the matching
/// fetch failed; the processor then falls back on what it last knew.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `coach_processor_new`.
/// - Non-NULL arguments must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_processor_resolve_index(
    processor: *mut ScoreProcessorHandle,
    questionnaire_json: *const c_char,
    sessions_json: *const c_char,
    now: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;
    let Some(questionnaire) = optional_arg(questionnaire_json, "questionnaire JSON") else {
        return ptr::null_mut();
    };
    let Some(sessions) = optional_arg(sessions_json, "sessions JSON") else {
        return ptr::null_mut();
    };
    let Some(at) = now_arg(now) else {
        return ptr::null_mut();
    };

    to_cstr_result(
        handle
            .processor
            .resolve_index_json(questionnaire.as_deref(), sessions.as_deref(), at)
            .and_then(|outcome| Ok(serde_json::to_string(&outcome)?)),
    )
}

/// Save processor state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `coach_processor_new`.
/// - Returns a newly allocated string that must be freed with `coach_free_string`.
/// - Returns NULL on error; call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_processor_save_state(
    processor: *mut ScoreProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;
    to_cstr_result(handle.processor.save_state())
}

/// Load processor state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `coach_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `coach_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn coach_processor_load_state(
    processor: *mut ScoreProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let Some(json) = required_arg(json, "JSON") else {
        return -1;
    };

    match handle.processor.load_state(&json) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Coach Score functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Coach Score function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn coach_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Coach Score call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn coach_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn coach_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null(), "unexpected NULL result");
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        coach_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_score_test() {
        let test = CString::new("equilibre").unwrap();
        let gender = CString::new("M").unwrap();

        unsafe {
            let result = take_string(coach_score_test(test.as_ptr(), 33.0, 45, gender.as_ptr()));
            let value: serde_json::Value = serde_json::from_str(&result).unwrap();
            // Men 41-50: 40/30/20/12
            assert_eq!(value["score"], 4);
            assert_eq!(value["form"], "equilibre");
        }
    }

    #[test]
    fn test_ffi_questionnaire_score() {
        let answers = CString::new(r#"{"A1": 4, "B2": 5, "weight": 0, "height": 170}"#).unwrap();

        unsafe {
            let result = take_string(coach_questionnaire_score(answers.as_ptr()));
            let value: serde_json::Value = serde_json::from_str(&result).unwrap();
            assert_eq!(value["totalScore"], 9);
            assert_eq!(value["imc"], "N/A");
        }
    }

    #[test]
    fn test_ffi_series() {
        let sessions = CString::new(
            r#"{"results": [
                {"date": "2025-03-10", "mood": 4, "realDuration": 1200, "state": "finished"}
            ]}"#,
        )
        .unwrap();
        let today = CString::new("2025-03-20").unwrap();

        unsafe {
            let weeks = take_string(coach_weekly_series(sessions.as_ptr(), 2025, 3));
            let weeks: serde_json::Value = serde_json::from_str(&weeks).unwrap();
            assert_eq!(weeks.as_array().unwrap().len(), 6);

            let months = take_string(coach_monthly_series(sessions.as_ptr(), 2025, today.as_ptr()));
            let months: serde_json::Value = serde_json::from_str(&months).unwrap();
            assert_eq!(months.as_array().unwrap().len(), 12);
            assert_eq!(months[2]["month"], "2025-03");
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = coach_processor_new();
            assert!(!processor.is_null());

            let test = CString::new("endurance").unwrap();
            let gender = CString::new("F").unwrap();
            let now = CString::new("2025-06-15T12:00:00Z").unwrap();
            let result = take_string(coach_processor_record_test(
                processor,
                test.as_ptr(),
                520.0,
                64,
                gender.as_ptr(),
                now.as_ptr(),
            ));
            assert!(result.contains("\"score\":4"));

            // Sessions fetch failed, questionnaire fetched
            let questionnaire =
                CString::new(r#"{"totalScore": 18, "createdAt": "2025-06-14T12:00:00Z"}"#).unwrap();
            let outcome = take_string(coach_processor_resolve_index(
                processor,
                questionnaire.as_ptr(),
                ptr::null(),
                now.as_ptr(),
            ));
            let outcome: serde_json::Value = serde_json::from_str(&outcome).unwrap();
            assert_eq!(outcome["status"], "questionnaire_fallback");
            assert_eq!(outcome["value"], 40.0);

            let state = coach_processor_save_state(processor);
            assert!(!state.is_null());

            let processor2 = coach_processor_new();
            assert_eq!(coach_processor_load_state(processor2, state), 0);

            coach_free_string(state);
            coach_processor_free(processor);
            coach_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_resolve_index_rejects_invalid_utf8_body() {
        unsafe {
            let processor = coach_processor_new();
            let questionnaire =
                CString::new(r#"{"totalScore": 18, "createdAt": "2025-06-14T12:00:00Z"}"#).unwrap();
            let sessions = CString::new(vec![0xff, 0xfe, b'[', b']']).unwrap();
            let now = CString::new("2025-06-15T12:00:00Z").unwrap();

            let result = coach_processor_resolve_index(
                processor,
                questionnaire.as_ptr(),
                sessions.as_ptr(),
                now.as_ptr(),
            );
            assert!(result.is_null());

            let error = coach_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("sessions JSON"));

            coach_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_weekly_series_out_of_range_year() {
        let sessions = CString::new("[]").unwrap();
        unsafe {
            let result = coach_weekly_series(sessions.as_ptr(), i32::MAX, 1);
            assert!(result.is_null());
            assert!(!coach_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let test = CString::new("equilibre").unwrap();
            let gender = CString::new("X").unwrap();

            let result = coach_score_test(test.as_ptr(), 30.0, 30, gender.as_ptr());
            assert!(result.is_null());

            let error = coach_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("Unsupported gender"));

            let result = coach_questionnaire_score(ptr::null());
            assert!(result.is_null());

            assert_eq!(coach_processor_load_state(ptr::null_mut(), ptr::null()), -1);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = coach_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
