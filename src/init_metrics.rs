pub(super) fn init_metrics() {
    describe_toplevel();
    describe_upload();
    describe_process();
    describe_object_storage();
}

fn describe_toplevel() {
    metrics::describe_counter!(FILES, "How many files have been uploaded to tubely");
}

pub(crate) const FILES: &str = "tubely.files";

fn describe_upload() {
    metrics::describe_counter!(
        UPLOAD_START,
        "How many video uploads have entered the processing pipeline"
    );
    metrics::describe_counter!(
        UPLOAD_END,
        "How many video uploads have left the processing pipeline, and whether they were published"
    );
    metrics::describe_histogram!(
        UPLOAD_DURATION,
        "Timings for running an upload through rewrite, probe and publish"
    );
}

pub(crate) const UPLOAD_START: &str = "tubely.upload.start";
pub(crate) const UPLOAD_END: &str = "tubely.upload.end";
pub(crate) const UPLOAD_DURATION: &str = "tubely.upload.duration";

fn describe_process() {
    metrics::describe_counter!(
        PROCESS_START,
        "Counter describing how many times a command has been spawned"
    );
    metrics::describe_histogram!(
        PROCESS_DURATION,
        "Timings for how long spawned commands took to complete"
    );
    metrics::describe_counter!(
        PROCESS_END,
        "Counter describing how many times a spawned command has exited, and whether it completed"
    );
}

pub(crate) const PROCESS_START: &str = "tubely.process.start";
pub(crate) const PROCESS_DURATION: &str = "tubely.process.duration";
pub(crate) const PROCESS_END: &str = "tubely.process.end";

fn describe_object_storage() {
    metrics::describe_counter!(
        STORE_PUT,
        "How many objects have been written to the store, and whether the write completed"
    );
}

pub(crate) const STORE_PUT: &str = "tubely.store.put";
