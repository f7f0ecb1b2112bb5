use std::fs;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 资源目录：pets 下两张图片，cars 为空
fn asset_tree() -> Result<TempDir> {
    let assets = TempDir::new()?;
    fs::create_dir_all(assets.path().join("pets"))?;
    fs::write(assets.path().join("pets").join("cat.jpg"), b"")?;
    fs::write(assets.path().join("pets").join("dog.png"), b"")?;
    fs::create_dir_all(assets.path().join("cars"))?;
    Ok(assets)
}

#[test]
fn list_collections() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let assets = asset_tree()?;

    cargo_run!("clipsearch", "-c", conf_dir.path(), "collections", "--assets", assets.path())
        .success()
        .stdout(predicate::str::contains("cars\t0"))
        .stdout(predicate::str::contains("pets\t0"));

    Ok(())
}

#[test]
fn search_without_index() -> Result<()> {
    let conf_dir = TempDir::new()?;

    // 向量库为空时不会调用提取程序
    cargo_run!(
        "clipsearch",
        "-c",
        conf_dir.path(),
        "search",
        "--extractor",
        "/nonexistent/clip-extract",
        "a photo of a cat"
    )
    .success()
    .stdout(predicate::str::contains("向量库为空"));

    Ok(())
}

#[test]
fn index_empty_collection() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let assets = asset_tree()?;

    cargo_run!(
        "clipsearch",
        "-c",
        conf_dir.path(),
        "index",
        "--extractor",
        "/nonexistent/clip-extract",
        "--assets",
        assets.path(),
        "cars"
    )
    .success()
    .stdout(predicate::str::contains("cars: 没有找到图片"));

    // 集合被复制到数据目录
    assert!(conf_dir.path().join("collections").join("cars").is_dir());
    assert!(!conf_dir.path().join("encoded.json").exists());

    Ok(())
}

#[test]
fn index_missing_collection() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let assets = asset_tree()?;

    cargo_run!("clipsearch", "-c", conf_dir.path(), "index", "--assets", assets.path(), "trees")
        .failure()
        .stderr(predicate::str::contains("资源目录不存在"));

    Ok(())
}

#[test]
fn index_with_failing_extractor() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let assets = asset_tree()?;

    // 提取程序无法启动，所有批次失败但命令本身成功
    cargo_run!(
        "clipsearch",
        "-c",
        conf_dir.path(),
        "index",
        "--extractor",
        "/nonexistent/clip-extract",
        "--assets",
        assets.path(),
        "pets"
    )
    .success()
    .stdout(predicate::str::contains("pets: 新增 0，跳过 0，失败 2"));

    cargo_run!("clipsearch", "-c", conf_dir.path(), "status")
        .success()
        .stdout(predicate::str::contains("向量总数: 0"));

    Ok(())
}

#[test]
fn index_rejects_path_like_collection() -> Result<()> {
    let conf_dir = TempDir::new()?;
    let assets = asset_tree()?;

    cargo_run!("clipsearch", "-c", conf_dir.path(), "index", "--assets", assets.path(), "../pets")
        .failure()
        .stderr(predicate::str::contains("无效的资源名称"));
    assert!(!conf_dir.path().join("pets").exists());

    Ok(())
}
