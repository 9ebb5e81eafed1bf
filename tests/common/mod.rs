//! Shared test fixture: a small repository with source code in three
//! languages, a markdown document, and an unsupported file.

use std::path::Path;

pub const C_SOURCE: &str =
    "#include <stdio.h>\nint main() {\n  printf(\"Hello world!\");\n  return 0;\n}\n";

pub const JAVA_SOURCE: &str = "public class Test {\n  public static void main(String[] args) { System.out.println(\"Hello world!\"); }\n}\n";

pub const PYTHON_SOURCE: &str = "print(\"Hello world!\")\n";

pub const MD_SOURCE: &str = "# A\n\nText under header A.\n\n## B\n\nText under header B.\n\n## C\n\nText under header C.\n\n### D\n\nText under header D.\n";

/// Lay out the fixture repository:
///
/// ```text
/// <dir>/
/// ├── bar/
/// │   ├── test.java
/// │   └── test.py
/// ├── foo/
/// │   ├── test.dummy
/// │   └── test.md
/// └── test.c
/// ```
pub fn write_fixture(dir: &Path) {
    std::fs::create_dir(dir.join("bar")).unwrap();
    std::fs::create_dir(dir.join("foo")).unwrap();
    std::fs::write(dir.join("test.c"), C_SOURCE).unwrap();
    std::fs::write(dir.join("bar").join("test.java"), JAVA_SOURCE).unwrap();
    std::fs::write(dir.join("bar").join("test.py"), PYTHON_SOURCE).unwrap();
    std::fs::write(dir.join("foo").join("test.md"), MD_SOURCE).unwrap();
    std::fs::write(dir.join("foo").join("test.dummy"), "dummy content\n").unwrap();
}
