//! Integration Test Harness
//!
//! Runs every integration suite and prints a summary.
//!
//! # Usage
//!
//! Run all suites:
//! ```text
//! cargo run -p integration-tests
//! ```
//!
//! Run one suite:
//! ```text
//! cargo test -p integration-tests --test activation_tests
//! cargo test -p integration-tests --test refcount_tests
//! cargo test -p integration-tests --test struct_tests
//! cargo test -p integration-tests --test property_value_tests
//! cargo test -p integration-tests --test async_tests
//! cargo test -p integration-tests --test event_tests
//! cargo test -p integration-tests --test lifecycle_tests
//! ```
//!
//! Run with logging:
//! ```text
//! RUST_LOG=debug cargo run -p integration-tests
//! ```

use std::process::Command;
use std::time::{Duration, Instant};

/// Test category
#[derive(Debug, Clone)]
struct TestCategory {
    name: &'static str,
    description: &'static str,
    test_name: &'static str,
}

const TEST_CATEGORIES: &[TestCategory] = &[
    TestCategory {
        name: "Activation Tests",
        description: "Factory caching, namespace walk, apartment lifecycle",
        test_name: "activation_tests",
    },
    TestCategory {
        name: "Refcount Tests",
        description: "Interface handle ownership and string handles",
        test_name: "refcount_tests",
    },
    TestCategory {
        name: "Struct Tests",
        description: "Value struct construction and native layout",
        test_name: "struct_tests",
    },
    TestCategory {
        name: "Property Value Tests",
        description: "Boxed scalar and array typing",
        test_name: "property_value_tests",
    },
    TestCategory {
        name: "Async Tests",
        description: "Async operations as futures, cancellation, errors",
        test_name: "async_tests",
    },
    TestCategory {
        name: "Event Tests",
        description: "Delegates, registration tokens, host sequences",
        test_name: "event_tests",
    },
    TestCategory {
        name: "Lifecycle Tests",
        description: "Activation outside the apartment window",
        test_name: "lifecycle_tests",
    },
];

fn print_banner() {
    println!(r#"
================================================================================
          _                          ___       _            _
    __  _| | __ _ _ __   __ _      |_ _|_ __ | |_ ___  ___| |_
    \ \/ / |/ _` | '_ \ / _` |      | || '_ \| __/ _ \/ __| __|
     >  <| | (_| | | | | (_| |      | || | | | ||  __/\__ \ |_
    /_/\_\_|\__,_|_| |_|\__, |     |___|_| |_|\__\___||___/\__|
                        |___/
                   Projection Core Integration Test Suite
================================================================================
"#);
}

fn print_test_categories(categories: &[&TestCategory]) {
    println!("Test Categories:");
    println!("{}", "-".repeat(80));
    for (i, cat) in categories.iter().enumerate() {
        println!("  {}. {} - {}", i + 1, cat.name, cat.description);
    }
    println!("{}", "-".repeat(80));
    println!();
}

/// Outcome of one suite run
struct CategoryResult {
    name: &'static str,
    success: bool,
    duration: Duration,
    summary: String,
}

fn run_test_category(category: &TestCategory) -> CategoryResult {
    println!("\n{}", "=".repeat(80));
    println!("Running: {}", category.name);
    println!("{}", "=".repeat(80));

    let start = Instant::now();
    let output = Command::new("cargo")
        .args(["test", "-p", "integration-tests", "--test", category.test_name, "--", "--nocapture"])
        .output();
    let duration = start.elapsed();

    let (success, summary) = match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stdout.is_empty() {
                println!("{}", stdout);
            }
            if !stderr.is_empty() {
                eprintln!("{}", stderr);
            }

            if output.status.success() {
                (true, "PASSED".to_string())
            } else {
                (false, format!("FAILED (exit code: {:?})", output.status.code()))
            }
        }
        Err(e) => (false, format!("Failed to execute: {}", e)),
    };

    CategoryResult {
        name: category.name,
        success,
        duration,
        summary,
    }
}

fn main() {
    // Optional filters: run only suites whose test name contains an argument
    let filters: Vec<String> = std::env::args().skip(1).collect();
    let selected: Vec<&TestCategory> = TEST_CATEGORIES
        .iter()
        .filter(|c| filters.is_empty() || filters.iter().any(|f| c.test_name.contains(f.as_str())))
        .collect();

    print_banner();
    print_test_categories(&selected);

    if selected.is_empty() {
        println!("No suite matches {:?}", filters);
        std::process::exit(2);
    }

    let total_start = Instant::now();
    let results: Vec<CategoryResult> = selected.iter().map(|c| run_test_category(c)).collect();
    let total_duration = total_start.elapsed();

    println!("\n{}", "=".repeat(80));
    println!("FINAL SUMMARY");
    println!("{}", "=".repeat(80));

    let passed = results.iter().filter(|r| r.success).count();
    let failed = results.len() - passed;

    println!("\nCategories: {} | Passed: {} | Failed: {}", results.len(), passed, failed);
    println!("Total Duration: {:?}", total_duration);
    println!();

    println!("{:<30} {:<10} {:<15} {}", "Category", "Status", "Duration", "Details");
    println!("{}", "-".repeat(80));
    for r in &results {
        let status = if r.success { "PASS" } else { "FAIL" };
        println!("{:<30} {:<10} {:<15?} {}", r.name, status, r.duration, r.summary);
    }
    println!("{}", "=".repeat(80));

    if failed > 0 {
        println!("\nSome suites failed!");
        std::process::exit(1);
    }
    println!("\nAll suites passed!");
}
