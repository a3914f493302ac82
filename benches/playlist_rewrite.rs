//! Benchmark playlist rewriting on a typical VOD media playlist.
//!
//! A two hour title with 6s segments gives ~1200 URI lines, each carrying
//! an origin query string that has to be dropped.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sharegate_common::ShareToken;
use sharegate_media::hls::{parent_dir, rewrite_playlist, rewrite_playlist_in};

fn media_playlist(segments: usize) -> String {
    let mut body = String::from(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n",
    );
    for i in 0..segments {
        body.push_str("#EXTINF:6.000000,\n");
        body.push_str(&format!(
            "hls1/main/{i}.ts?DeviceId=abc&MediaSourceId=def&PlaySessionId=123&api_key=secret\n"
        ));
    }
    body.push_str("#EXT-X-ENDLIST\n");
    body
}

fn master_playlist() -> String {
    let mut body = String::from("#EXTM3U\n");
    for (bandwidth, height) in [(800_000, 480), (2_500_000, 720), (6_000_000, 1080)] {
        body.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={}x{height}\n",
            height * 16 / 9
        ));
        body.push_str(&format!(
            "http://origin:8096/Videos/abc/main.m3u8?MaxHeight={height}&api_key=secret&DeviceId=d\n"
        ));
    }
    body
}

fn bench_rewrite(c: &mut Criterion) {
    let token = ShareToken::generate();
    let media = media_playlist(1200);
    let master = master_playlist();
    let already_rewritten = rewrite_playlist(&media, &token).unwrap();

    let mut group = c.benchmark_group("playlist_rewrite");

    group.bench_function("master", |b| {
        b.iter(|| rewrite_playlist(black_box(&master), black_box(&token)).unwrap());
    });

    group.bench_function("media_1200_segments", |b| {
        b.iter(|| rewrite_playlist(black_box(&media), black_box(&token)).unwrap());
    });

    group.bench_function("media_nested", |b| {
        let base = parent_dir("hls1/main.m3u8");
        b.iter(|| rewrite_playlist_in(black_box(&media), black_box(&token), base).unwrap());
    });

    // Cached playlists are already rewritten; rewriting again must stay cheap.
    group.bench_function("fixed_point", |b| {
        b.iter(|| rewrite_playlist(black_box(&already_rewritten), black_box(&token)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
