mod auth;
mod config;
mod discover;
mod error;
mod error_code;
mod ffmpeg;
mod formats;
mod future;
mod ingest;
mod init_metrics;
mod init_tracing;
mod media;
mod process;
mod repo;
mod serde_str;
mod store;
mod tmp_file;


use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{
    http::header::CONTENT_LENGTH,
    web::{self, Bytes},
    App, FromRequest, HttpRequest, HttpResponse, HttpServer,
};
use futures_core::Stream;
use futures_util::{StreamExt, TryStreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use mime::Mime;
use std::{path::Path, pin::Pin};
use tokio::io::AsyncWriteExt;
use tracing::Instrument;
use tracing_actix_web::TracingLogger;
use uuid::Uuid;

use self::{
    auth::{Authenticated, JwtKeys},
    config::Configuration,
    error::{Error, UploadError},
    formats::ThumbnailFormat,
    init_metrics::FILES,
    init_tracing::init_tracing,
    media::{FfMpeg, MediaTools},
    repo::{FullRepo, Repo, Thumbnail, Video},
    store::{object_store::ObjectStore, Store},
    tmp_file::{ArcTmpDir, TmpDir, TmpFile},
};

pub use self::config::{ConfigSource, TubelyConfiguration};

const VIDEO_FIELD: &str = "video";
const THUMBNAIL_FIELD: &str = "thumbnail";

const FORM_HEADROOM: u64 = 8 * 1024 * 1024;

/// The multipart parser's own cap sits a chunk above the ceiling, so oversized parts are rejected
/// by `write_limited` and `read_limited`
fn form_limit(limit: u64) -> usize {
    usize::try_from(limit.saturating_add(FORM_HEADROOM)).unwrap_or(usize::MAX)
}

async fn write_limited<S>(file: &TmpFile, stream: S, limit: u64) -> Result<(), Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut output = tokio::fs::File::create(&**file).await?;
    let mut written: u64 = 0;

    while let Some(bytes) = stream.next().await {
        let bytes = bytes?;

        written += bytes.len() as u64;
        if written > limit {
            return Err(UploadError::TooLarge(limit).into());
        }

        output.write_all(&bytes).await?;
    }

    output.flush().await?;

    Ok(())
}

async fn read_limited<S>(stream: S, limit: u64) -> Result<Vec<u8>, Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut buf = Vec::new();

    while let Some(bytes) = stream.next().await {
        let bytes = bytes?;

        if (buf.len() + bytes.len()) as u64 > limit {
            return Err(UploadError::TooLarge(limit).into());
        }

        buf.extend_from_slice(&bytes);
    }

    Ok(buf)
}

type PartStream = Pin<Box<dyn Stream<Item = Result<Bytes, actix_form_data::Error>>>>;

/// Parts without a Content-Type are rejected the same way as parts with the wrong one
fn part_media_type(content_type: Option<Mime>) -> Result<Mime, Error> {
    content_type.ok_or_else(|| UploadError::MissingContentType.into())
}

struct VideoUpload(Value<TmpFile>);

impl FormData for VideoUpload {
    type Item = TmpFile;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // This form is expecting a single file field, 'video', holding an mp4
        let tmp_dir = req
            .app_data::<web::Data<ArcTmpDir>>()
            .expect("No TmpDir in request")
            .clone();
        let config = req
            .app_data::<web::Data<Configuration>>()
            .expect("No configuration in request")
            .clone();

        Ok(Form::new()
            .max_files(1)
            .max_file_size(form_limit(config.media.max_video_size))
            .transform_error(transform_error)
            .field(
                VIDEO_FIELD,
                Field::file(
                    move |filename: String, content_type: Option<Mime>, stream: PartStream| {
                        let tmp_dir = tmp_dir.clone();
                        let limit = config.media.max_video_size;

                        metrics::counter!(FILES, "kind" => "video").increment(1);

                        let span = tracing::info_span!("video-upload", ?filename, ?content_type);

                        let stream = stream.map_err(Error::from);

                        Box::pin(
                            async move {
                                let content_type = part_media_type(content_type)?;

                                if !formats::is_video_mp4(&content_type) {
                                    return Err(
                                        UploadError::UnsupportedMediaType(content_type).into()
                                    );
                                }

                                let staged = tmp_dir.tmp_file(Some(".mp4"));
                                write_limited(&staged, stream, limit).await?;

                                Ok::<_, Error>(staged)
                            }
                            .instrument(span),
                        )
                    },
                ),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(VideoUpload(value))
    }
}

struct ThumbnailUpload(Value<Thumbnail>);

impl FormData for ThumbnailUpload {
    type Item = Thumbnail;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        let config = req
            .app_data::<web::Data<Configuration>>()
            .expect("No configuration in request")
            .clone();

        Ok(Form::new()
            .max_files(1)
            .max_file_size(form_limit(config.media.max_thumbnail_size))
            .transform_error(transform_error)
            .field(
                THUMBNAIL_FIELD,
                Field::file(
                    move |filename: String, content_type: Option<Mime>, stream: PartStream| {
                        let limit = config.media.max_thumbnail_size;

                        metrics::counter!(FILES, "kind" => "thumbnail").increment(1);

                        let span =
                            tracing::info_span!("thumbnail-upload", ?filename, ?content_type);

                        let stream = stream.map_err(Error::from);

                        Box::pin(
                            async move {
                                let content_type = part_media_type(content_type)?;

                                let format = ThumbnailFormat::from_media_type(&content_type)
                                    .ok_or(UploadError::UnsupportedMediaType(content_type))?;

                                let data = read_limited(stream, limit).await?;

                                Ok::<_, Error>(Thumbnail {
                                    media_type: format.media_type(),
                                    data,
                                })
                            }
                            .instrument(span),
                        )
                    },
                ),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(ThumbnailUpload(value))
    }
}

fn parse_video_id(video_id: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(video_id).map_err(|e| UploadError::InvalidVideoId(e).into())
}

/// Load the video behind `video_id`, failing unless `user` owns it
async fn owned_video<R: FullRepo>(
    repo: &R,
    video_id: &str,
    user: Authenticated,
) -> Result<Video, Error> {
    let video_id = parse_video_id(video_id)?;

    let video = repo
        .video(video_id)
        .await?
        .ok_or(UploadError::MissingVideo)?;

    if !video.is_owned_by(user.user_id) {
        tracing::warn!(
            "User {} attempted to modify video {video_id} owned by {}",
            user.user_id,
            video.user_id
        );
        return Err(UploadError::NotOwner.into());
    }

    Ok(video)
}

fn check_content_length(req: &HttpRequest, limit: u64) -> Result<(), Error> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    // Content-Length covers the multipart envelope too
    match declared {
        Some(length) if length > limit.saturating_add(FORM_HEADROOM) => {
            Err(UploadError::TooLarge(limit).into())
        }
        _ => Ok(()),
    }
}

fn file_result<T: 'static>(value: Value<T>, field: &str) -> Result<T, Error> {
    value
        .map()
        .and_then(|mut m| m.remove(field))
        .and_then(|v| v.file())
        .map(|file| file.result)
        .ok_or_else(|| UploadError::NoFiles.into())
}

/// Stage, rewrite, probe and publish a video, then point its record at the published object
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(name = "Upload video", skip(req, payload, repo, store, media, config))]
async fn upload_video<R: FullRepo + 'static, S: Store + 'static, M: MediaTools + 'static>(
    req: HttpRequest,
    payload: web::Payload,
    video_id: web::Path<String>,
    user: Authenticated,
    repo: web::Data<R>,
    store: web::Data<S>,
    media: web::Data<M>,
    config: web::Data<Configuration>,
) -> Result<HttpResponse, actix_web::Error> {
    let video = owned_video(repo.get_ref(), &video_id, user).await?;
    check_content_length(&req, config.media.max_video_size)?;

    let Multipart(VideoUpload(value)) =
        Multipart::<VideoUpload>::from_request(&req, &mut payload.into_inner()).await?;

    let staged = file_result(value, VIDEO_FIELD)?;

    let video = ingest::ingest(
        repo.get_ref(),
        store.get_ref(),
        media.get_ref(),
        config.media.key_layout,
        staged,
        video.id,
    )
    .await?;

    tracing::info!("Published video {}", video.id);

    Ok(HttpResponse::Accepted().json(&video))
}

#[derive(Debug, serde::Deserialize)]
struct NewVideo {
    title: String,
    #[serde(default)]
    description: String,
}

#[tracing::instrument(name = "Create video", skip(body, repo))]
async fn create_video<R: FullRepo + 'static>(
    body: Bytes,
    user: Authenticated,
    repo: web::Data<R>,
) -> Result<HttpResponse, Error> {
    let NewVideo { title, description } =
        serde_json::from_slice(&body).map_err(UploadError::InvalidRequestBody)?;

    let video = Video::new(user.user_id, title, description);
    repo.create_video(&video).await?;

    Ok(HttpResponse::Created().json(&video))
}

#[tracing::instrument(name = "List videos", skip(repo))]
async fn list_videos<R: FullRepo + 'static>(
    user: Authenticated,
    repo: web::Data<R>,
) -> Result<HttpResponse, Error> {
    let videos = repo.videos_for_user(user.user_id).await?;

    Ok(HttpResponse::Ok().json(&videos))
}

#[tracing::instrument(name = "Get video", skip(repo))]
async fn get_video<R: FullRepo + 'static>(
    video_id: web::Path<String>,
    _user: Authenticated,
    repo: web::Data<R>,
) -> Result<HttpResponse, Error> {
    let video_id = parse_video_id(&video_id)?;

    let video = repo
        .video(video_id)
        .await?
        .ok_or(UploadError::MissingVideo)?;

    Ok(HttpResponse::Ok().json(&video))
}

#[tracing::instrument(name = "Upload thumbnail", skip(req, payload, repo, config))]
async fn upload_thumbnail<R: FullRepo + 'static>(
    req: HttpRequest,
    payload: web::Payload,
    video_id: web::Path<String>,
    user: Authenticated,
    repo: web::Data<R>,
    config: web::Data<Configuration>,
) -> Result<HttpResponse, actix_web::Error> {
    let video = owned_video(repo.get_ref(), &video_id, user).await?;
    check_content_length(&req, config.media.max_thumbnail_size)?;

    let Multipart(ThumbnailUpload(value)) =
        Multipart::<ThumbnailUpload>::from_request(&req, &mut payload.into_inner()).await?;

    let thumbnail = file_result(value, THUMBNAIL_FIELD)?;

    repo.put_thumbnail(video.id, thumbnail)
        .await
        .map_err(Error::from)?;

    let thumbnail_url = format!(
        "{}/api/thumbnails/{}",
        config.server.public_url.as_str().trim_end_matches('/'),
        video.id
    );
    let video = repo
        .set_thumbnail_url(video.id, thumbnail_url)
        .await
        .map_err(Error::from)?
        .ok_or(UploadError::MissingVideo)
        .map_err(Error::from)?;

    Ok(HttpResponse::Ok().json(&video))
}

#[tracing::instrument(name = "Serve thumbnail", skip(repo))]
async fn serve_thumbnail<R: FullRepo + 'static>(
    video_id: web::Path<String>,
    repo: web::Data<R>,
) -> Result<HttpResponse, Error> {
    let video_id = parse_video_id(&video_id)?;

    let Thumbnail { media_type, data } = repo
        .thumbnail(video_id)
        .await?
        .ok_or(UploadError::MissingThumbnail)?;

    Ok(HttpResponse::Ok()
        .content_type(media_type.essence_str())
        .body(data))
}

async fn healthz<R: FullRepo + 'static, S: Store + 'static>(
    repo: web::Data<R>,
    store: web::Data<S>,
) -> Result<HttpResponse, Error> {
    repo.health_check().await?;
    store.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn configure_endpoints<R, S, M>(
    config: &mut web::ServiceConfig,
    repo: R,
    store: S,
    media: M,
    configuration: Configuration,
    tmp_dir: ArcTmpDir,
    keys: web::Data<JwtKeys>,
) where
    R: FullRepo + 'static,
    S: Store + 'static,
    M: MediaTools + 'static,
{
    config
        .app_data(web::Data::new(repo))
        .app_data(web::Data::new(store))
        .app_data(web::Data::new(media))
        .app_data(web::Data::new(configuration))
        .app_data(web::Data::new(tmp_dir))
        .app_data(keys)
        .route("/healthz", web::get().to(healthz::<R, S>))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/video_upload/{video_id}")
                        .route(web::post().to(upload_video::<R, S, M>))
                        .route(web::put().to(upload_video::<R, S, M>)),
                )
                .service(
                    web::resource("/videos")
                        .route(web::post().to(create_video::<R>))
                        .route(web::get().to(list_videos::<R>)),
                )
                .service(web::resource("/videos/{video_id}").route(web::get().to(get_video::<R>)))
                .service(
                    web::resource("/thumbnail_upload/{video_id}")
                        .route(web::post().to(upload_thumbnail::<R>)),
                )
                .service(
                    web::resource("/thumbnails/{video_id}")
                        .route(web::get().to(serve_thumbnail::<R>)),
                ),
        );
}

async fn launch<R>(
    repo: R,
    store: ObjectStore,
    media: FfMpeg,
    config: Configuration,
    tmp_dir: ArcTmpDir,
) -> std::io::Result<()>
where
    R: FullRepo + Send + 'static,
{
    let address = config.server.address;
    let keys = web::Data::new(JwtKeys::new(&config.server.jwt_secret));

    tracing::info!("Starting tubely on {address}");

    HttpServer::new(move || {
        let repo = repo.clone();
        let store = store.clone();
        let media = media.clone();
        let config = config.clone();
        let tmp_dir = tmp_dir.clone();
        let keys = keys.clone();

        App::new()
            .wrap(TracingLogger::default())
            .configure(move |sc| {
                configure_endpoints(sc, repo, store, media, config, tmp_dir, keys)
            })
    })
    .bind(address)?
    .run()
    .await
}

impl<P: AsRef<Path>, T: serde::Serialize> ConfigSource<P, T> {
    /// Initialize the tubely configuration
    ///
    /// This takes an optional save_to path, which the merged configuration will be saved into.
    /// Since most parameters have defaults, dumping one is a quick way to see what can be tweaked.
    ///
    /// When running tubely as a library, configuration is limited to environment variables,
    /// configuration files and in-memory values. Commandline options are not available.
    ///
    /// ```rust
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     tubely::ConfigSource::memory(serde_json::json!({
    ///         "server": {
    ///             "address": "127.0.0.1:8091",
    ///             "jwt_secret": "change-me"
    ///         },
    ///         "repo": {
    ///             "type": "sled",
    ///             "path": "./sled-repo"
    ///         },
    ///         "store": {
    ///             "type": "filesystem",
    ///             "path": "./files",
    ///             "public_endpoint": "http://localhost:8091/files"
    ///         }
    ///     })).init::<&str>(None)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn init<Q: AsRef<Path>>(
        self,
        save_to: Option<Q>,
    ) -> color_eyre::Result<TubelyConfiguration> {
        config::configure_without_clap(self, save_to)
    }
}

impl TubelyConfiguration {
    /// Build the tubely configuration from commandline arguments
    ///
    /// This is probably not useful for 3rd party applications that handle their own commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        config::configure()
    }

    /// Install the default tubely tracer
    ///
    /// This is probably not useful for 3rd party applications that install their own tracing
    /// subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
            tracing::info!("Starting prometheus endpoint on {addr}");
        }

        init_metrics::init_metrics();

        Ok(self)
    }

    /// Run the tubely application
    ///
    /// This returns once the HTTP server has shut down
    pub async fn run(self) -> color_eyre::Result<()> {
        let TubelyConfiguration { config } = self;

        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;

        let repo = Repo::open(config.repo.clone())?;

        let store = match config.store.clone() {
            config::Store::Filesystem(filesystem) => {
                ObjectStore::build_filesystem(filesystem).await?
            }
            config::Store::ObjectStorage(storage) => ObjectStore::build_s3(storage)?,
        };

        let media = FfMpeg::new(&config.media);

        match repo {
            Repo::Sled(sled_repo) => {
                launch(sled_repo.clone(), store, media, config, tmp_dir.clone()).await?;

                sled_repo.flush().await?;
            }
        }

        tmp_dir.cleanup().await?;

        Ok(())
    }
}
