//! Generates the Swift and Kotlin bindings for `biokit-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
