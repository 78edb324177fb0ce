//! Exercise the camera service from the command line.
//!
//! Usage: cargo run --bin camera_demo <command>
//!   clock              sync the drone's clock
//!   photo              take a photo into the current directory
//!   list               list videos on the sd card
//!   record <secs>      record a clip of the given length
//!   download <name>    save a listed video locally
//!   replay <name>      save a video's raw stream as replay<name>
//!   delete <name>      remove a video from the sd card

use std::time::Duration;

use visuo::Camera;

fn usage() -> ! {
    eprintln!("usage: camera_demo clock|photo|list|record <secs>|download <name>|replay <name>|delete <name>");
    std::process::exit(2);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), visuo::Error> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let camera = Camera::new();

    match args.first().map(String::as_str) {
        Some("clock") => {
            camera.set_clock().await?;
            println!("clock set");
        }
        Some("photo") => {
            let path = camera.take_photo().await?;
            println!("saved {}", path.display());
        }
        Some("list") => {
            for video in camera.list_videos().await? {
                println!("{:4} s  {}", video.duration_secs, video.name);
            }
        }
        Some("record") => {
            let secs: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or_else(|| usage());
            camera.set_clock().await?;
            println!("recording for {secs} s");
            camera.capture_video(Duration::from_secs(secs)).await?;
            println!("done");
        }
        Some("download") => {
            let name = args.get(1).unwrap_or_else(|| usage());
            let path = camera.download_video(name).await?;
            println!("saved {}", path.display());
        }
        Some("replay") => {
            let name = args.get(1).unwrap_or_else(|| usage());
            let path = camera.replay_to_file(name).await?;
            println!("saved {}", path.display());
        }
        Some("delete") => {
            let name = args.get(1).unwrap_or_else(|| usage());
            camera.delete_video(name).await?;
            println!("deleted {name}");
        }
        _ => usage(),
    }
    Ok(())
}
