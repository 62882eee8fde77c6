/*!
 * Pipes Manager Tests
 * Naming, registration, and lifetime
 */

use pipefs::{PipeError, PipesManager, WaitConfig};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

fn manager() -> Arc<PipesManager> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(PipesManager::with_config(WaitConfig::fast()))
}

#[test]
fn test_auto_generated_names_are_unique() {
    let pm = manager();
    let a = pm.create("", None).unwrap();
    let b = pm.create("", None).unwrap();
    assert_ne!(a.name(), b.name());
    assert!(pm.exists(a.name()));
    assert!(pm.exists(b.name()));
    assert_eq!(pm.len(), 2);

    pm.close(a);
    pm.close(b);
    assert!(pm.is_empty());
}

#[test]
fn test_duplicate_create_rejected_first_pipe_intact() {
    let pm = manager();
    let first = pm.create("pipe://dup/", None).unwrap();
    first.write(b"payload", None).unwrap();

    assert!(matches!(
        pm.create("pipe://dup/", None),
        Err(PipeError::AlreadyExists(_))
    ));

    assert!(pm.exists("pipe://dup/"));
    let stats = pm.stats("pipe://dup/").unwrap();
    assert_eq!(stats.holders, 1);
    assert_eq!(stats.buffered, 7);

    pm.close(first);
}

#[test]
fn test_refcount_destroys_exactly_after_last_close() {
    let pm = manager();
    let name = "pipe://counted/";

    let creator = pm.create(name, None).unwrap();
    let h1 = pm.open(name).unwrap();
    let h2 = pm.open(name).unwrap();
    assert_eq!(pm.stats(name).unwrap().holders, 3);

    pm.close(h1);
    assert!(pm.exists(name));
    pm.close(creator);
    assert!(pm.exists(name));
    assert_eq!(pm.stats(name).unwrap().holders, 1);

    pm.close(h2);
    assert!(!pm.exists(name));
    assert!(pm.open(name).is_none());
}

#[test]
fn test_open_nonexistent_creates_nothing() {
    let pm = manager();
    assert!(pm.open("pipe://nonexistent/").is_none());
    assert!(!pm.exists("pipe://nonexistent/"));
    assert!(pm.is_empty());
}

#[test]
fn test_racing_creators_exactly_one_wins() {
    let pm = manager();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pm = Arc::clone(&pm);
            thread::spawn(move || pm.create("pipe://shared/", None))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(PipeError::AlreadyExists(_))))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, 1);
    assert!(pm.exists("pipe://shared/"));
    // Only the winner holds a handle
    assert_eq!(pm.stats("pipe://shared/").unwrap().holders, 1);

    for result in results {
        if let Ok(pipe) = result {
            pm.close(pipe);
        }
    }
    assert!(!pm.exists("pipe://shared/"));
}

#[test]
fn test_destroy_frees_the_pipe() {
    let pm = manager();
    let creator = pm.create("pipe://short-lived/", None).unwrap();
    let weak = Arc::downgrade(&creator);

    pm.close(creator);
    // Last handle released: the registry dropped the pipe entirely
    assert!(!pm.exists("pipe://short-lived/"));
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_pipe_names_lists_registry() {
    let pm = manager();
    let a = pm.create("pipe://a/", None).unwrap();
    let b = pm.create("pipe://b/", None).unwrap();

    let mut names = pm.pipe_names();
    names.sort();
    assert_eq!(names, vec!["pipe://a/".to_string(), "pipe://b/".to_string()]);

    pm.close(a);
    pm.close(b);
}

#[test]
fn test_stats_serialize() {
    let pm = manager();
    let pipe = pm.create("pipe://stats/", Some(4096)).unwrap();
    pipe.write(b"test data", None).unwrap();

    let stats = pm.stats("pipe://stats/").unwrap();
    assert_eq!(stats.capacity, 4096);
    assert_eq!(stats.buffered, 9);
    assert!(!stats.closed);

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["name"], "pipe://stats/");
    assert_eq!(json["buffered"], 9);
    // Quiet flags are skipped while false
    assert!(json.get("closed").is_none());
    assert!(json.get("eof").is_none());

    pm.close(pipe);
}
