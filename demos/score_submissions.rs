use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    bucket_scoring::example_apps::run_score_submissions(std::env::args().skip(1))
}
