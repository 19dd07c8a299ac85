//! Default configuration values

/// Project manifest file name
pub const MANIFEST_FILE: &str = "kompile.toml";

/// Directory (relative to the project) holding kompile state
pub const STATE_DIR: &str = ".kompile";

/// Build cache file name inside the state directory
pub const BUILD_CACHE_FILE: &str = "build-cache.json";

/// Current build cache format version
///
/// Bump whenever the on-disk layout changes; older files are then ignored.
pub const BUILD_CACHE_FORMAT_VERSION: u32 = 1;

/// Toolchain binary looked up on `PATH` when none is configured
pub const DEFAULT_TOOLCHAIN_BINARY: &str = "elide";

/// Default main source root
pub const DEFAULT_MAIN_SOURCES: &str = "src/main/kotlin";

/// Default Java source root
pub const DEFAULT_JAVA_SOURCES: &str = "src/main/java";

/// Default test source root
pub const DEFAULT_TEST_SOURCES: &str = "src/test/kotlin";

/// Default main classes output directory
pub const DEFAULT_CLASSES_DIR: &str = "target/classes";

/// Default test classes output directory
pub const DEFAULT_TEST_CLASSES_DIR: &str = "target/test-classes";

/// Default Kotlin/JS test output directory
pub const DEFAULT_JS_TEST_DIR: &str = "target/test-js";

/// Global config file name inside the config directory
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
