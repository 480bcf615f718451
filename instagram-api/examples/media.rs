use instagram_api::{Client, InstagramApiError, Request};

#[tokio::main]
pub async fn main() -> Result<(), InstagramApiError> {
    let client = Client::new();

    let req = Request::media()
        .list("access_token")
        .fields("id,caption,media_type,media_url,permalink");

    let res = client.send(req).await?;
    println!("{} media items", res.data.len());
    Ok(())
}
