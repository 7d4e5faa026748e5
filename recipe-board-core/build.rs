fn main() {
    // Short random id stamped on graph exports. Without rerun-if-changed this
    // is regenerated whenever anything in the package changes.
    let id = uuid::Uuid::new_v4().simple().to_string();
    let short_id: String = id.chars().take(8).collect();
    println!("cargo:rustc-env=BUILD_ID={}", short_id);
}
