//! End-to-end requests against the shared site fixture

use std::io::{Read, Write};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use lql::engine::ExecutionContext;
use lql::eventconsole::{EventConsoleClient, EventConsoleConfig};
use lql::monitoring::{LiveCore, Snapshot};
use lql::security::AuthorizationPolicy;
use lql::server::{ResponseCode, Store};
use lql::Answer;

fn fixture() -> Snapshot {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site.json");
    Snapshot::load(&path).unwrap()
}

fn store_with(ctx: ExecutionContext, event_console: Option<EventConsoleClient>) -> Store {
    Store::new(Arc::new(LiveCore::new(fixture())), ctx, event_console)
}

fn ask(request: &str) -> Answer {
    store_with(ExecutionContext::default(), None).answer_request(request, &|| false)
}

fn body(request: &str) -> String {
    let answer = ask(request);
    assert_eq!(answer.code, ResponseCode::Ok, "{}", answer.output);
    answer.output
}

// ============================================================================
// Basic queries
// ============================================================================

#[test]
fn test_filter_selects_down_host() {
    assert_eq!(body("GET hosts\nColumns: name\nFilter: state = 1\n"), "h2\n");
}

#[test]
fn test_count_stats() {
    assert_eq!(body("GET hosts\nStats: state = 0\n"), "2\n");
}

#[test]
fn test_unknown_column_is_rejected() {
    let answer = ask("GET hosts\nColumns: name nosuchcolumn\n");
    assert_eq!(answer.code, ResponseCode::BadRequest);
    assert_eq!(answer.output, "Columns: table 'hosts' has no column 'nosuchcolumn'\n");
}

#[test]
fn test_limit_returns_first_row() {
    assert_eq!(body("GET hosts\nColumns: name\nLimit: 1\n"), "h1\n");
}

#[test]
fn test_default_columns_with_headers() {
    let out = body("GET commands\n");
    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("name\tline"));
    assert_eq!(out.lines().count(), 3);
}

#[test]
fn test_prefixed_column_names() {
    assert_eq!(
        body("GET hosts\nColumns: host_name\nFilter: host_address = 10.0.0.3\n"),
        "h3\n"
    );
}

#[test]
fn test_or_and_negate() {
    let out = body(
        "GET services\nColumns: host_name description\nFilter: state = 1\nFilter: state = 2\nOr: 2\nNegate:\n",
    );
    assert_eq!(out, "h1\tCPU\nh3\tCPU\nh3\tHTTP\n");
}

#[test]
fn test_regex_filter() {
    assert_eq!(body("GET hosts\nColumns: name\nFilter: alias ~ ^web\n"), "h1\nh3\n");
    assert_eq!(body("GET hosts\nColumns: name\nFilter: alias ~~ DB\n"), "h2\n");
}

#[test]
fn test_list_membership() {
    assert_eq!(body("GET hosts\nColumns: name\nFilter: groups >= web\n"), "h1\nh3\n");
    assert_eq!(body("GET hosts\nColumns: name\nFilter: parents = \n"), "h1\nh2\n");
}

#[test]
fn test_custom_variable_filter() {
    assert_eq!(
        body("GET hosts\nColumns: name\nFilter: custom_variables ~ TAGS prod\n"),
        "h1\n"
    );
}

#[test]
fn test_label_filters() {
    assert_eq!(body("GET hosts\nColumns: name\nFilter: labels = os linux\n"), "h1\nh2\n");
    assert_eq!(
        body("GET services\nColumns: host_name description\nFilter: labels ~ team .\n"),
        "h1\tCPU\nh3\tHTTP\n"
    );
    assert_eq!(body("GET labels\nColumns: value\nFilter: name = site\n"), "prod\n");
}

#[test]
fn test_separators() {
    let out = body("GET hosts\nColumns: name groups\nFilter: name = h1\nSeparators: 10 59 124 47\n");
    assert_eq!(out, "h1;web|all\n");
}

// ============================================================================
// Output formats
// ============================================================================

#[test]
fn test_json_output_parses() {
    let out = body("GET services\nColumns: host_name description state\nOutputFormat: json\n");
    let rows: Vec<(String, String, i64)> = serde_json::from_str(&out).unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[1], ("h1".to_string(), "Disk".to_string(), 2));
}

#[test]
fn test_json_with_headers_and_stats() {
    let out = body("GET services\nColumns: host_name\nStats: state = 0\nColumnHeaders: on\nOutputFormat: json\n");
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value,
        serde_json::json!([["host_name", "stats_1"], ["h1", 1], ["h2", 0], ["h3", 1]])
    );
}

#[test]
fn test_python_output() {
    let out = body("GET hosts\nColumns: name\nFilter: name = h1\nOutputFormat: python\n");
    assert_eq!(out, "[[\"h1\"]]\n");
}

#[test]
fn test_csv_quoting() {
    let out = body("GET services\nColumns: description plugin_output\nFilter: description = Disk\nOutputFormat: CSV\n");
    assert_eq!(out, "\"Disk\",\"CRIT - / is 99% full\"\r\n");
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn test_aggregates() {
    let out = body("GET services\nStats: sum latency\nStats: min latency\nStats: max latency\nStats: avg latency\n");
    assert_eq!(out, "4\t0\t2\t0.8\n");
}

#[test]
fn test_avg_of_nothing_is_zero() {
    assert_eq!(body("GET services\nFilter: state = 9\nStats: avg latency\n"), "0\n");
}

#[test]
fn test_aggregating_a_string_is_rejected() {
    let answer = ask("GET hosts\nStats: sum name\n");
    assert_eq!(answer.code, ResponseCode::BadRequest);
}

#[test]
fn test_grouped_stats_on_groups_table() {
    let out = body("GET hostgroups\nColumns: name\nStats: num_hosts > 0\n");
    assert_eq!(out, "web\t1\nall\t1\n");
}

// ============================================================================
// Authorization
// ============================================================================

#[test]
fn test_auth_user_on_services() {
    let out = body("GET services\nColumns: host_name description\nAuthUser: bob\n");
    assert_eq!(out, "h1\tCPU\n");
}

#[test]
fn test_strict_service_authorization() {
    let ctx = ExecutionContext {
        authorization: AuthorizationPolicy {
            service_authorization: lql::security::AuthorizationKind::Strict,
            ..AuthorizationPolicy::default()
        },
        ..ExecutionContext::default()
    };
    let store = store_with(ctx, None);
    let answer = store.answer_request("GET services\nColumns: description\nAuthUser: carol\n", &|| false);
    assert_eq!(answer.output, "");
}

#[test]
fn test_see_all_contact() {
    let ctx = ExecutionContext {
        authorization: AuthorizationPolicy {
            see_all: vec!["bob".to_string()],
            ..AuthorizationPolicy::default()
        },
        ..ExecutionContext::default()
    };
    let store = store_with(ctx, None);
    let answer = store.answer_request("GET hosts\nStats: state >= 0\nAuthUser: bob\n", &|| false);
    assert_eq!(answer.output, "3\n");
}

// ============================================================================
// Log, status, framing
// ============================================================================

#[test]
fn test_log_time_window_newest_first() {
    let out = body("GET log\nColumns: time host_name\nFilter: time >= 1700000200\nFilter: time < 1700000400\n");
    assert_eq!(out, "1700000300\th1\n1700000200\th2\n");
}

#[test]
fn test_log_hides_unknown_hosts_from_contacts() {
    let out = body("GET log\nColumns: host_name\nAuthUser: alice\n");
    assert_eq!(out, "h1\nh2\n");
}

#[test]
fn test_status_table() {
    assert_eq!(body("GET status\nColumns: nagios_pid num_hosts\n"), "4242\t3\n");
}

#[test]
fn test_fixed16_error_response() {
    let answer = ask("GET nosuchtable\nResponseHeader: fixed16\n");
    assert_eq!(answer.code, ResponseCode::NotFound);
    assert!(answer.output.starts_with("404          "));
    assert!(answer.output.ends_with("\nInvalid GET request, no such table 'nosuchtable'\n"));
    assert_eq!(&answer.output[15..16], "\n");
}

#[test]
fn test_localtime_out_of_range_is_bad_request() {
    let answer = ask("GET hosts\nColumns: name\nLocaltime: 9223372036854775808\nResponseHeader: fixed16\n");
    assert_eq!(answer.code, ResponseCode::BadRequest);
    assert!(answer.output.starts_with("400 "));
    assert!(answer.output.ends_with("\nLocaltime: timestamp out of range\n"));

    let answer = ask("GET hosts\nColumns: name\nLocaltime: 9223372036854775807\n");
    assert_eq!(answer.code, ResponseCode::BadRequest);
    assert_eq!(
        answer.output,
        "Localtime: timezone difference greater than or equal to 24 hours\n"
    );
}

#[test]
fn test_wait_object_must_exist() {
    let answer = ask("GET hosts\nWaitObject: nope\nWaitCondition: state = 0\nWaitTimeout: 10\n");
    assert_eq!(answer.code, ResponseCode::BadRequest);
}

#[test]
fn test_response_size_limit() {
    let ctx = ExecutionContext {
        max_response_size: 10,
        ..ExecutionContext::default()
    };
    let answer = store_with(ctx, None)
        .answer_request("GET services\nColumns: host_name description plugin_output\n", &|| false);
    assert_eq!(answer.code, ResponseCode::LimitExceeded);
}

// ============================================================================
// Event console
// ============================================================================

fn fake_console(dir: &Path, reply: &'static str) -> (EventConsoleClient, thread::JoinHandle<String>) {
    let path = dir.join("status");
    let listener = UnixListener::bind(&path).unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = String::new();
        stream.read_to_string(&mut request).unwrap();
        stream.write_all(reply.as_bytes()).unwrap();
        request
    });
    let config = EventConsoleConfig {
        enabled: true,
        socket_path: path,
        timeout_secs: 5,
    };
    (EventConsoleClient::new(&config), handle)
}

#[test]
fn test_event_console_rows_join_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let (client, handle) = fake_console(
        dir.path(),
        "event_id\tevent_text\tevent_host\tevent_contact_groups_precedence\tevent_contact_groups\n\
         7\tdisk full\th1\thost\t\x02\n\
         8\tlink down\tunknown-box\thost\t\x02\n",
    );
    let store = store_with(ExecutionContext::default(), Some(client));
    let answer = store.answer_request(
        "GET eventconsoleevents\nColumns: event_id event_text host_alias\nFilter: event_id = 7\n",
        &|| false,
    );
    assert_eq!(answer.code, ResponseCode::Ok);
    assert_eq!(answer.output, "7\tdisk full\tweb one\n");
    let request = handle.join().unwrap();
    assert!(request.starts_with("GET events\nOutputFormat: plain\nColumns: event_id event_text event_host"));
    assert!(request.contains("\nFilter: event_id = 7\n"));
}

#[test]
fn test_event_console_unreachable_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let config = EventConsoleConfig {
        enabled: true,
        socket_path: dir.path().join("missing"),
        timeout_secs: 1,
    };
    let store = store_with(ExecutionContext::default(), Some(EventConsoleClient::new(&config)));
    let answer = store.answer_request(
        "GET eventconsoleevents\nColumns: event_id\nResponseHeader: fixed16\n",
        &|| false,
    );
    assert_eq!(answer.code, ResponseCode::BadGateway);
    assert!(answer.output.starts_with("502 "));
    assert!(answer.output.contains("cannot connect to event console"));
}

#[test]
fn test_event_console_malformed_row_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let (client, handle) = fake_console(dir.path(), "event_id\tevent_text\n1\tok\n2\n");
    let store = store_with(ExecutionContext::default(), Some(client));
    let answer = store.answer_request(
        "GET eventconsoleevents\nColumns: event_id event_text\nResponseHeader: fixed16\n",
        &|| false,
    );
    handle.join().unwrap();
    assert_eq!(answer.code, ResponseCode::BadGateway);
    assert!(answer.output.starts_with("502 "));
    assert!(answer.output.contains("expected 2 fields, got 1"));
    assert!(!answer.output.contains("1\tok"));
}
