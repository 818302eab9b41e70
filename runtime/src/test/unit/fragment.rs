use std::io::Write;

use test_case::test_case;

use crate::error::Error;
use crate::fragment::{CodeFragment, FragmentStore, is_include_directive};

#[test_case("#include <stdio.h>", true ; "system header")]
#[test_case("  #include \"local.h\"", true ; "space indented")]
#[test_case("\t#include <math.h>", true ; "tab indented")]
#[test_case("#include\t<math.h>", true ; "tab separator")]
#[test_case("#include<math.h>", false ; "no separator")]
#[test_case("#include", false ; "bare keyword")]
#[test_case("// #include <math.h>", false ; "commented out")]
#[test_case("#define N 4", false ; "other directive")]
fn test_include_directive(line: &str, expected: bool) {
    assert_eq!(is_include_directive(line), expected);
}

#[test]
fn test_parse_splits_includes_from_body() {
    let fragment = CodeFragment::parse("int a;\n#include <x.h>\nint b;\n  #include \"y.h\"");
    assert_eq!(fragment.includes(), ["#include <x.h>", "  #include \"y.h\""]);
    assert_eq!(fragment.body(), "int a;\nint b;");
    assert_eq!(fragment.source(), "#include <x.h>\n  #include \"y.h\"\nint a;\nint b;");
}

#[test]
fn test_compose_two_fragments() {
    let mut store = FragmentStore::new();
    store.add("a", "#include <foo.h>\nvoid f(){}").unwrap();
    store.add("b", "int g(){return 1;}").unwrap();

    assert_eq!(store.compose(), "#include <foo.h>\nvoid f(){}\nint g(){return 1;}");
}

#[test]
fn test_compose_deduplicates_includes() {
    let mut store = FragmentStore::new();
    store.add("a", "#include <math.h>\n#include <stdio.h>\nint f();").unwrap();
    store.add("b", "#include <stdio.h>\n#include <stdlib.h>\nint g();").unwrap();

    assert_eq!(
        store.compose(),
        "#include <math.h>\n#include <stdio.h>\n#include <stdlib.h>\nint f();\nint g();"
    );
}

#[test]
fn test_compose_empty_store() {
    assert_eq!(FragmentStore::new().compose(), "");
}

#[test]
fn test_include_only_fragment_keeps_a_body_line() {
    let mut store = FragmentStore::new();
    store.add("headers", "#include <math.h>").unwrap();
    store.add("code", "int g();").unwrap();

    assert_eq!(store.compose(), "#include <math.h>\n\nint g();");
}

#[test]
fn test_overwrite_keeps_registration_slot() {
    let mut store = FragmentStore::new();
    store.add("a", "int a1;").unwrap();
    store.add("b", "int b;").unwrap();
    store.add("a", "int a2;").unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.names().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(store.compose(), "int a2;\nint b;");
}

#[test]
fn test_pop_removes_fragment() {
    let mut store = FragmentStore::new();
    store.add("a", "void f(){}\n#include <foo.h>").unwrap();

    assert_eq!(store.pop("a").unwrap(), "#include <foo.h>\nvoid f(){}");
    assert!(!store.contains("a"));
    assert!(store.is_empty());
    assert!(matches!(store.pop("a"), Err(Error::FragmentNotFound { name }) if name == "a"));
}

#[test]
fn test_text_and_file_registration_match() {
    let source = "#include <math.h>\ndouble twice(double x) { return 2.0 * x; }\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();

    let mut store = FragmentStore::new();
    store.add("text", source).unwrap();
    store.add("file", file.path()).unwrap();

    assert_eq!(store.get("text"), store.get("file"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.c");

    let mut store = FragmentStore::new();
    let err = store.add("absent", path.clone()).unwrap_err();
    assert!(matches!(err, Error::FragmentRead { path: p, .. } if p == path));
    assert!(store.is_empty());
}
