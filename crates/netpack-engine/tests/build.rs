//! Integration tests for whole builds
//!
//! Network-domain modules are served from memory by a small test plugin, so
//! these tests exercise hook dispatch, domain stickiness and linking without
//! touching the network.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use netpack_engine::{
    build, BuildOptions, Domain, Entry, Format, LoadResult, MinifyOptions, OnLoadOptions,
    OnResolveOptions, Plugin, ResolveResult, StdinOptions,
};
use regex::Regex;
use tempfile::TempDir;

/// Serves `mem://` modules; `relative` also claims relative imports inside them
fn memory_plugin(files: &[(&str, &str)], relative: bool) -> Plugin {
    let files: Arc<HashMap<String, String>> = Arc::new(
        files
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    );
    Plugin::new("memory", move |build| {
        build.on_resolve(
            OnResolveOptions {
                filter: Regex::new("^mem://").unwrap(),
                domain: None,
            },
            |args| Ok(Some(ResolveResult::new(args.path, Domain::Network))),
        );
        if relative {
            build.on_resolve(
                OnResolveOptions {
                    filter: Regex::new(".*").unwrap(),
                    domain: Some(Domain::Network),
                },
                |args| {
                    let name = args.path.trim_start_matches("./");
                    Ok(Some(ResolveResult::new(format!("mem://{name}"), Domain::Network)))
                },
            );
        }
        build.on_load(
            OnLoadOptions {
                filter: Regex::new(".*").unwrap(),
                domain: Some(Domain::Network),
            },
            move |args| match files.get(args.path) {
                Some(contents) => Ok(Some(LoadResult {
                    contents: contents.clone(),
                })),
                None => Err(format!("no such module {}", args.path).into()),
            },
        );
    })
}

fn stdin(contents: &str) -> Entry {
    Entry::Stdin(StdinOptions::new(contents).with_sourcefile("imaginary-file.js"))
}

fn options(entry: Entry, plugins: Vec<Plugin>) -> BuildOptions {
    let mut options = BuildOptions::new(entry);
    options.plugins = plugins;
    options
}

#[test]
fn test_star_export_of_remote_module() {
    let plugin = memory_plugin(&[("mem://constants.js", "export const pi = 3.14;\n")], false);
    let result = build(options(
        stdin("export * from 'mem://constants.js';\nexport const hello = 'world';\n"),
        vec![plugin],
    ));

    assert!(result.is_ok(), "{:?}", result.errors);
    let output = result.output().unwrap();
    assert!(output.contains("const pi = 3.14;"));
    assert!(output.contains("const hello = 'world';"));
    assert!(output.contains("as pi"));
    assert!(output.contains("export {"));
    assert!(!output.contains("mem://"));
    assert!(!output.contains("import"));
}

#[test]
fn test_relative_import_inside_remote_module() {
    let plugin = memory_plugin(
        &[
            ("mem://a.js", "import { b } from './b.js';\nexport const a = b + 1;"),
            ("mem://b.js", "export const b = 41;"),
        ],
        true,
    );
    let result = build(options(stdin("import { a } from 'mem://a.js';\nconsole.log(a);"), vec![plugin]));

    assert!(result.is_ok(), "{:?}", result.errors);
    let output = result.output().unwrap();
    let b = output.find("const b = 41;").unwrap();
    let a = output.find("const a = ").unwrap();
    assert!(b < a);
    assert!(output.contains(".b + 1;"));
}

#[test]
fn test_network_importer_without_hook_fails() {
    let plugin = memory_plugin(
        &[("mem://a.js", "import './b.js';"), ("mem://b.js", "")],
        false,
    );
    let result = build(options(stdin("import 'mem://a.js';"), vec![plugin]));

    assert_eq!(result.errors.len(), 1);
    assert!(result.output_files.is_empty());
    assert!(result.errors[0]
        .text
        .contains("no plugin handles imports from the network module \"mem://a.js\""));
}

#[test]
fn test_load_hook_error_names_plugin() {
    let plugin = memory_plugin(&[], false);
    let result = build(options(stdin("import 'mem://gone.js';"), vec![plugin]));

    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert_eq!(error.plugin.as_deref(), Some("memory"));
    assert_eq!(
        error.text,
        "Could not load \"mem://gone.js\" (plugin \"memory\"): no such module mem://gone.js"
    );
}

#[test]
fn test_missing_export() {
    let plugin = memory_plugin(&[("mem://a.js", "export const yes = 1;")], false);
    let result = build(options(stdin("import { no } from 'mem://a.js';"), vec![plugin]));

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].text.contains("No matching export in \"mem://a.js\" for import \"no\""));
}

#[test]
fn test_import_cycle_bundles_with_warning() {
    let plugin = memory_plugin(
        &[
            (
                "mem://a.js",
                "import { isOdd } from 'mem://b.js';\nexport const isEven = (n) => n === 0 || isOdd(n - 1);",
            ),
            (
                "mem://b.js",
                "import { isEven } from 'mem://a.js';\nexport const isOdd = (n) => n !== 0 && isEven(n - 1);",
            ),
        ],
        false,
    );
    let result = build(options(
        stdin("import { isEven } from 'mem://a.js';\nconsole.log(isEven(4));"),
        vec![plugin],
    ));

    assert!(result.is_ok(), "{:?}", result.errors);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].text, "Import cycle: mem://a.js -> mem://b.js -> mem://a.js");
    assert_eq!(result.warnings[0].file.as_deref(), Some("mem://a.js"));

    let output = result.output().unwrap();
    assert!(output.contains(".isOdd)(n - 1)"), "{output}");
    assert!(output.contains(".isEven)(n - 1)"), "{output}");
}

#[test]
fn test_entry_in_cycle_gets_module_object() {
    let plugin = memory_plugin(
        &[("mem://dep.js", "import { name } from 'imaginary-file.js';\nexport const greet = () => name;")],
        false,
    );
    let entry_hook = Plugin::new("entry", |build| {
        build.on_resolve(
            OnResolveOptions {
                filter: Regex::new("^imaginary-file\\.js$").unwrap(),
                domain: None,
            },
            |args| Ok(Some(ResolveResult::new(args.path, Domain::Filesystem))),
        );
    });
    let result = build(options(
        stdin("import { greet } from 'mem://dep.js';\nexport const name = 'entry';\nconsole.log(greet());"),
        vec![entry_hook, plugin],
    ));

    assert!(result.is_ok(), "{:?}", result.errors);
    assert_eq!(result.warnings.len(), 1);
    let output = result.output().unwrap();
    assert!(output.contains("const __netpack_m0 = {};"), "{output}");
    assert!(output.contains("__netpack_m0.name"), "{output}");
}

#[test]
fn test_imported_bindings_stay_live() {
    let plugin = memory_plugin(
        &[(
            "mem://counter.js",
            "export let count = 0;\nexport function increment() { count += 1; }\n",
        )],
        false,
    );
    let result = build(options(
        stdin("import { count, increment } from 'mem://counter.js';\nincrement();\nconsole.log(count);\n"),
        vec![plugin],
    ));

    assert!(result.is_ok(), "{:?}", result.errors);
    let output = result.output().unwrap();
    // Read through the module object at use time, never copied at import time
    assert!(output.contains("console.log(__netpack_m1.count);"), "{output}");
    assert!(output.contains("count: ()=>count") || output.contains("count: () => count"), "{output}");
    assert!(!output.contains("const { count"));
}

#[test]
fn test_shared_dependency_emitted_once() {
    let plugin = memory_plugin(
        &[
            ("mem://a.js", "import { s } from 'mem://shared.js';\nexport const a = s;"),
            ("mem://b.js", "import { s } from 'mem://shared.js';\nexport const b = s;"),
            ("mem://shared.js", "export const s = 'shared';"),
        ],
        false,
    );
    let result = build(options(
        stdin("import { a } from 'mem://a.js';\nimport { b } from 'mem://b.js';\nconsole.log(a, b);"),
        vec![plugin],
    ));

    let output = result.output().unwrap();
    assert_eq!(output.matches("const s = 'shared';").count(), 1);
}

#[test]
fn test_syntax_error_in_remote_module() {
    let plugin = memory_plugin(&[("mem://a.js", "export const x = (1;")], false);
    let result = build(options(stdin("import 'mem://a.js';"), vec![plugin]));

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].file.as_deref(), Some("mem://a.js"));
}

#[test]
fn test_no_bundle_returns_entry() {
    let source = "import x from 'mem://never-fetched.js';\nexport default x;\n";
    let mut options = options(stdin(source), vec![memory_plugin(&[], false)]);
    options.bundle = false;
    let result = build(options);

    let output = result.output().unwrap();
    assert!(output.contains("import x from 'mem://never-fetched.js';"), "{output}");
    assert!(output.contains("export default x;"), "{output}");
}

#[test]
fn test_iife_format() {
    let plugin = memory_plugin(&[("mem://c.js", "export const pi = 3.14;")], false);
    let mut options = options(stdin("export * from 'mem://c.js';"), vec![plugin]);
    options.format = Format::Iife;
    let result = build(options);

    let output = result.output().unwrap();
    assert!(output.trim_end().ends_with("})();"), "{output}");
    assert!(!output.contains("export"));
    assert!(output.contains("3.14"));
}

#[test]
fn test_minified_output() {
    let plugin = memory_plugin(&[("mem://c.js", "// constants\nexport const pi = 3.14;\n")], false);
    let mut options = options(stdin("export * from 'mem://c.js';"), vec![plugin]);
    options.minify = MinifyOptions::all();
    let result = build(options);

    let output = result.output().unwrap();
    assert!(!output.contains("__netpack_"));
    assert!(!output.contains("// constants"));
    assert!(output.contains("pi=3.14"), "{output}");
    assert!(!output.contains("\n\n"));
}

#[test]
fn test_filesystem_entry_and_imports() {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("main.js"), "import { greet } from './greet';\ngreet('fs');\n").unwrap();
    fs::write(src.join("greet.js"), "export function greet(who) { return 'hi ' + who; }\n").unwrap();

    let result = build(BuildOptions::new(Entry::File(src.join("main.js"))));

    assert!(result.is_ok(), "{:?}", result.errors);
    let output = result.output().unwrap();
    assert!(output.contains("function greet(who)"));
    assert!(output.contains(".greet)('fs');"), "{output}");
}

#[test]
fn test_stdin_resolve_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("util.js"), "export const util = 1;").unwrap();

    let entry = Entry::Stdin(StdinOptions::new("import { util } from './util.js';\nutil;").with_resolve_dir(dir.path()));
    let result = build(BuildOptions::new(entry));

    assert!(result.is_ok(), "{:?}", result.errors);
}

#[test]
fn test_missing_file_entry() {
    let dir = TempDir::new().unwrap();
    let result = build(BuildOptions::new(Entry::File(dir.path().join("nope.js"))));

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].text.starts_with("Could not read"));
}

#[test]
fn test_filesystem_module_same_path_as_remote_is_distinct() {
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("x.js");
    fs::write(&local, "export const where = 'disk';").unwrap();
    let local_path = local.canonicalize().unwrap().display().to_string();

    // A hook that tags the same path as a network module
    let path_for_hook = local_path.clone();
    let plugin = Plugin::new("shadow", move |build| {
        build.on_resolve(
            OnResolveOptions {
                filter: Regex::new("^remote$").unwrap(),
                domain: None,
            },
            move |_| Ok(Some(ResolveResult::new(path_for_hook.clone(), Domain::Network))),
        );
        build.on_load(
            OnLoadOptions {
                filter: Regex::new(".*").unwrap(),
                domain: Some(Domain::Network),
            },
            |_| Ok(Some(LoadResult {
                contents: "export const there = 'network';".to_string(),
            })),
        );
    });

    let entry = Entry::Stdin(
        StdinOptions::new("import { where } from './x.js';\nimport { there } from 'remote';\nconsole.log(where, there);")
            .with_resolve_dir(dir.path()),
    );
    let mut options = BuildOptions::new(entry);
    options.plugins = vec![plugin];
    let result = build(options);

    assert!(result.is_ok(), "{:?}", result.errors);
    let output = result.output().unwrap();
    assert!(output.contains("'disk'"));
    assert!(output.contains("'network'"));
}
