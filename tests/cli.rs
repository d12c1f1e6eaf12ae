use std::io::Write;

use clap::Parser;
use idm::Args;

#[tokio::test]
async fn upload_image_against_fake_backend_round_trips() {
    let image_path = write_temp_jpeg("idm-cli-test-image.jpg");

    let args = Args::try_parse_from([
        "idm",
        "--fake",
        "upload-image",
        image_path.to_str().unwrap(),
        "--width",
        "64",
        "--height",
        "32",
    ])
    .expect("upload-image arguments should parse");

    let mut output = Vec::new();
    idm::run(args, &mut output)
        .await
        .expect("upload against the fake backend should succeed");

    let output = String::from_utf8(output).expect("output should be UTF-8");
    assert!(output.contains("uploaded"));
}

#[tokio::test]
async fn upload_image_rejects_a_non_jpeg_file() {
    let mut path = std::env::temp_dir();
    path.push("idm-cli-test-not-a-jpeg.bin");
    std::fs::write(&path, b"not a jpeg").unwrap();

    let args = Args::try_parse_from([
        "idm",
        "--fake",
        "upload-image",
        path.to_str().unwrap(),
        "--width",
        "64",
        "--height",
        "32",
    ])
    .expect("upload-image arguments should parse");

    let mut output = Vec::new();
    let result = idm::run(args, &mut output).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn inspect_against_fake_backend_reports_device_status() {
    let args = Args::try_parse_from(["idm", "--fake", "inspect"])
        .expect("inspect arguments should parse");

    let mut output = Vec::new();
    idm::run(args, &mut output)
        .await
        .expect("inspect against the fake backend should succeed");

    let output = String::from_utf8(output).expect("output should be UTF-8");
    assert!(output.contains("device_name"));
}

fn write_temp_jpeg(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0x03, 0x04]).unwrap();
    path
}
