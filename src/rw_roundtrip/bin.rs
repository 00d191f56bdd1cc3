use resworks::prelude::RwResult;
use resworks::{cli, rw_roundtrip};

fn main() -> RwResult<()> {
    let args = cli::roundtrip().get_matches();
    rw_roundtrip::run(&args)
}
