//! Integration Test Harness
//!
//! Runs every integration test category and prints a summary.
//!
//! # Usage
//!
//! Run all tests:
//! ```text
//! cargo run -p integration-tests
//! ```
//!
//! Run specific test categories:
//! ```text
//! cargo test -p integration-tests --test lifetime_stress_tests
//! cargo test -p integration-tests --test activation_tests
//! cargo test -p integration-tests --test registration_tests
//! cargo test -p integration-tests --test enumeration_tests
//! cargo test -p integration-tests --test error_channel_tests
//! ```
//!
//! Run with increased logging:
//! ```text
//! RUST_LOG=comserver=debug cargo run -p integration-tests
//! ```


use std::process::Command;
use std::time::Instant;
use common::{CategoryResult, TestSuiteResults};

/// Test category
#[derive(Debug, Clone)]
struct TestCategory {
    name: &'static str,
    description: &'static str,
    test_name: &'static str,
}

const TEST_CATEGORIES: &[TestCategory] = &[
    TestCategory {
        name: "Lifetime Stress Tests",
        description: "Concurrent LockServer and object churn against one server",
        test_name: "lifetime_stress_tests",
    },
    TestCategory {
        name: "Activation Tests",
        description: "Entry points, class factories and local-server registration",
        test_name: "activation_tests",
    },
    TestCategory {
        name: "Registration Tests",
        description: "Registration facts written to and removed from the store",
        test_name: "registration_tests",
    },
    TestCategory {
        name: "Enumeration Tests",
        description: "Bulk-fetch cursors and enumerator objects",
        test_name: "enumeration_tests",
    },
    TestCategory {
        name: "Error Channel Tests",
        description: "Per-thread error records across the boundary",
        test_name: "error_channel_tests",
    },
];

fn print_banner() {
    println!("{}", "=".repeat(80));
    println!("               comserver Integration Test Suite");
    println!("{}", "=".repeat(80));
}

fn print_test_categories() {
    println!("Test Categories:");
    println!("{}", "-".repeat(80));
    for (i, cat) in TEST_CATEGORIES.iter().enumerate() {
        println!("  {}. {} - {}", i + 1, cat.name, cat.description);
    }
    println!("{}", "-".repeat(80));
    println!();
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

    let (passed, summary) = match output {
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
        passed,
        duration,
        summary,
    }
}

fn main() {
    print_banner();
    print_test_categories();

    println!("Starting integration test suite...\n");

    let total_start = Instant::now();
    let mut results = TestSuiteResults::new();

    for category in TEST_CATEGORIES {
        results.record(run_test_category(category));
    }

    let total_duration = total_start.elapsed();

    println!("\n{}", "=".repeat(80));
    println!("FINAL SUMMARY");
    println!("{}", "=".repeat(80));

    println!(
        "\nCategories: {} | Passed: {} | Failed: {}",
        results.categories.len(),
        results.passed(),
        results.failed()
    );
    println!("Total Duration: {:?}", total_duration);
    println!();

    println!("{:<30} {:<10} {:<15} {}", "Category", "Status", "Duration", "Details");
    println!("{}", "-".repeat(80));

    for result in &results.categories {
        let status = if result.passed { "PASS" } else { "FAIL" };
        println!("{:<30} {:<10} {:<15?} {}", result.name, status, result.duration, result.summary);
    }

    println!("{}", "=".repeat(80));

    if results.failed() > 0 {
        println!("\nSome tests failed!");
        std::process::exit(1);
    } else {
        println!("\nAll tests passed!");
        std::process::exit(0);
    }
}
